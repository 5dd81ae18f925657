//! Track source port definition.
//!
//! Supplies the ordered list of remote audio files for a library item,
//! usually by opening a play session against the media server.

use async_trait::async_trait;

use super::PortError;
use crate::download::{ItemId, RemoteTrack};

/// Port for listing the remote tracks of an item.
#[async_trait]
pub trait TrackSourcePort: Send + Sync {
    /// List the tracks of an item (or one of its episodes).
    ///
    /// Order is not guaranteed; callers sort by [`RemoteTrack::index`].
    async fn get_tracks(
        &self,
        item_id: &ItemId,
        episode_id: Option<String>,
    ) -> Result<Vec<RemoteTrack>, PortError>;
}
