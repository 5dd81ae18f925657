//! Core domain types and port definitions for shelf audiobook downloads.
//!
//! - [`download`] - identifiers, transfer engine records, progress snapshots, events, errors
//! - [`ports`] - collaborator traits (transfer engine, track source, preferences,
//!   notifications) and the scheduler's public API
//! - [`settings`] - user-tunable scheduler timings
//! - [`paths`] - downloads directory resolution
#![deny(unused_crate_dependencies)]

pub mod download;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use download::{
    DownloadError, DownloadEvent, ItemId, ItemProgress, ProgressStatus, QueueStatus, RemoteTrack,
    TaskDescriptor, TaskMetadata, TaskRecord, TaskStatus, TaskUpdate, TaskUpdateKind,
};
pub use paths::{PathError, default_downloads_dir, prepare_downloads_dir, resolve_downloads_dir};
pub use ports::{
    DownloadEventEmitterPort, DownloadNotifierPort, DownloadSchedulerConfig,
    DownloadSchedulerPort, MemoryPreferenceStore, NoopDownloadEmitter, NoopNotifier, PortError,
    PreferenceStorePort, TrackSourcePort, TransferEnginePort,
};
pub use settings::{SchedulerSettings, SettingsError, validate_settings};
