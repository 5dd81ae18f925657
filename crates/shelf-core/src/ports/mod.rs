//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the download core expects from its
//! collaborators. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No platform or HTTP client types in any signature
//! - Collaborator failures are reported as [`PortError`]
//! - Fire-and-forget sinks (notifications, events) are synchronous and infallible

pub mod download_event_emitter;
pub mod download_scheduler;
pub mod notifier;
pub mod preferences;
pub mod track_source;
pub mod transfer_engine;

use thiserror::Error;

pub use download_event_emitter::{DownloadEventEmitterPort, NoopDownloadEmitter};
pub use download_scheduler::{DownloadSchedulerConfig, DownloadSchedulerPort};
pub use notifier::{DownloadNotifierPort, NoopNotifier};
pub use preferences::{MemoryPreferenceStore, PreferenceStorePort};
pub use track_source::TrackSourcePort;
pub use transfer_engine::TransferEnginePort;

/// Errors reported by collaborator ports.
///
/// This error type abstracts away transport and storage details so the
/// scheduler can decide how to degrade without knowing the backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    /// The collaborator could not be reached.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend error (preferences, task database, filesystem).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PortError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for PortError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
