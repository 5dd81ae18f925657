//! Destination planning for track downloads.
//!
//! Items get one directory each under the downloads root; tracks are named
//! after their index so the probe can find them again.

use std::path::PathBuf;

use shelf_core::download::{DownloadError, ItemId, RemoteTrack};

use crate::probe::{LocalFileProbe, track_filename};

/// A planned track destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDestination {
    /// The item directory where the track will be stored.
    pub item_dir: PathBuf,
    /// File name within the item directory.
    pub filename: String,
}

impl TrackDestination {
    /// Plan where `track` of `item_id` goes.
    pub fn plan(probe: &LocalFileProbe, item_id: &ItemId, track: &RemoteTrack) -> Self {
        Self {
            item_dir: probe.item_dir(item_id),
            filename: track_filename(track.index, &track.mime_type),
        }
    }

    /// Ensure the item directory exists, creating it if necessary.
    pub fn ensure_dir(&self) -> Result<(), DownloadError> {
        if !self.item_dir.exists() {
            std::fs::create_dir_all(&self.item_dir)
                .map_err(|e| DownloadError::io("create_dir", e.to_string()))?;
        }
        Ok(())
    }

    /// Full path of the track file.
    pub fn path(&self) -> PathBuf {
        self.item_dir.join(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_uses_item_dir_and_track_name() {
        let probe = LocalFileProbe::new("/books");
        let track = RemoteTrack::new(7, "https://srv/7", "audio/mpeg");

        let dest = TrackDestination::plan(&probe, &ItemId::new("li/9"), &track);

        assert_eq!(dest.item_dir, PathBuf::from("/books/li_9"));
        assert_eq!(dest.filename, "track_007.mp3");
        assert_eq!(dest.path(), PathBuf::from("/books/li_9/track_007.mp3"));
    }

    #[test]
    fn ensure_dir_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let probe = LocalFileProbe::new(root.path());
        let track = RemoteTrack::new(0, "https://srv/0", "audio/flac");

        let dest = TrackDestination::plan(&probe, &ItemId::new("b1"), &track);
        dest.ensure_dir().unwrap();
        dest.ensure_dir().unwrap();

        assert!(dest.item_dir.is_dir());
    }
}
