//! Serial download scheduler for audiobooks.
//!
//! Books are lists of audio tracks. This crate downloads them through a
//! single transfer slot: one track of one book at a time, chaining to the
//! next missing track as each one completes, and moving to the next queued
//! book when the current one is fully on disk.
//!
//! # Modules
//!
//! - `manager` - the scheduler service (runner, chain listener, cancellation)
//! - `queue` - ordered, deduplicated queue of waiting items
//! - `state` - per-item lifecycle and timing guards
//! - `progress` - snapshot aggregation and rate-limiting
//! - `probe` - which tracks exist on disk
//! - `adapter` - transfer engine task descriptors and update decoding
//! - `registry` - persisted set of canceled items
//! - `prefs` - JSON file preference store
//!
//! # Usage
//!
//! ```ignore
//! let scheduler = build_download_scheduler(DownloadSchedulerDeps {
//!     engine,
//!     track_source,
//!     preferences: Arc::new(JsonFilePreferenceStore::open(prefs_path).await?),
//!     notifier: Arc::new(NoopNotifier),
//!     event_emitter: Arc::new(NoopDownloadEmitter::new()),
//!     config: DownloadSchedulerConfig::new(default_downloads_dir()?),
//! })
//! .await?;
//!
//! scheduler.enqueue(ItemId::new("li_1"), None, Some("Dune".into())).await?;
//! ```

// Re-export core types for convenience
pub use shelf_core::download::{
    DownloadError, DownloadEvent, ItemId, ItemProgress, ProgressStatus, QueueStatus, RemoteTrack,
    TaskDescriptor, TaskMetadata, TaskRecord, TaskStatus, TaskUpdate, TaskUpdateKind,
};
pub use shelf_core::ports::{
    DownloadEventEmitterPort, DownloadNotifierPort, DownloadSchedulerConfig,
    DownloadSchedulerPort, PreferenceStorePort, TrackSourcePort, TransferEnginePort,
};

// Internal modules (pub(crate) to keep implementation private)
pub(crate) mod adapter;
pub(crate) mod probe;
pub(crate) mod progress;
pub(crate) mod queue;
pub(crate) mod registry;
pub(crate) mod state;

// Building blocks useful to hosts and adapters
pub use adapter::{ItemEvent, ItemEventKind, owner_of, to_item_event};
pub use probe::{LocalFileProbe, extension_for_mime, track_filename};
pub use progress::{ProgressInputs, ProgressThrottle, aggregate};
pub use state::{InvalidTransition, ItemPhase, ItemTransition};

mod prefs;
pub use prefs::JsonFilePreferenceStore;

// Public API - the scheduler service
mod manager;

pub use manager::{
    DownloadSchedulerDeps, DownloadSchedulerImpl, RejectReason, ScheduleOutcome,
    TrackDestination, build_download_scheduler, matching_task_ids,
};
