//! Download domain types, events, errors, and snapshots.
//!
//! This module contains pure data types for the download system. No I/O,
//! networking, or runtime dependencies allowed.
//!
//! # Structure
//!
//! - `types` - Identifiers and transfer engine records (`ItemId`, `TaskRecord`, `TaskUpdate`)
//! - `events` - Outbound events (`DownloadEvent`)
//! - `errors` - Error types for download operations
//! - `progress` - Per-item progress snapshots (`ItemProgress`)
//! - `queue` - Queue summary DTO (`QueueStatus`)

pub mod errors;
pub mod events;
pub mod progress;
pub mod queue;
pub mod types;

// Re-export commonly used types
pub use errors::DownloadError;
pub use events::DownloadEvent;
pub use progress::{ItemProgress, ProgressStatus};
pub use queue::QueueStatus;
pub use types::{
    ItemId, RemoteTrack, TaskDescriptor, TaskMetadata, TaskRecord, TaskStatus, TaskUpdate,
    TaskUpdateKind,
};
