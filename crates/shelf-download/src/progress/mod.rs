//! Progress aggregation and throttling.
//!
//! [`aggregate`] merges what the scheduler knows about an item (track list,
//! files on disk, durable records, live events, lifecycle phase) into one
//! [`ItemProgress`] snapshot. It is a pure function; gathering the inputs is
//! the scheduler's job.

mod throttle;

use shelf_core::download::{ItemProgress, ProgressStatus};

use crate::state::ItemPhase;

pub use throttle::ProgressThrottle;

/// Smallest progress shown for a running item.
pub const MIN_RUNNING_PROGRESS: f64 = 0.01;

/// Everything the aggregator looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressInputs {
    /// Number of tracks (0 when unknown).
    pub total_tracks: u32,
    /// Tracks present on disk.
    pub completed: u32,
    /// Fraction of the track in transfer, unless missing or stale.
    pub running_fraction: Option<f64>,
    /// Item is in the blocked registry.
    pub blocked: bool,
    /// Item is waiting in the global queue.
    pub queued: bool,
    /// Lifecycle phase of the item.
    pub phase: ItemPhase,
    /// Some durable record of the item failed.
    pub any_record_failed: bool,
    /// Some durable record of the item is running.
    pub any_record_running: bool,
    /// The just-queued grace window is open.
    pub in_grace: bool,
    /// The live running flag is set and fresh.
    pub live: bool,
}

/// Compute a snapshot from its inputs.
pub fn aggregate(inputs: &ProgressInputs) -> ItemProgress {
    let total = inputs.total_tracks;
    let completed = inputs.completed;

    let status = if total > 0 && completed >= total {
        ProgressStatus::Complete
    } else if inputs.any_record_failed || inputs.phase == ItemPhase::Failed {
        ProgressStatus::Failed
    } else if inputs.any_record_running || inputs.in_grace || inputs.live {
        ProgressStatus::Running
    } else if inputs.queued || inputs.phase.is_activated() {
        ProgressStatus::Queued
    } else {
        ProgressStatus::None
    };

    let progress = if inputs.blocked {
        0.0
    } else {
        let fraction = inputs.running_fraction.unwrap_or(0.0).clamp(0.0, 1.0);
        let raw = (f64::from(completed) + fraction) / f64::from(total.max(1));
        let clamped = raw.clamp(0.0, 1.0);
        if status == ProgressStatus::Running && clamped < MIN_RUNNING_PROGRESS {
            MIN_RUNNING_PROGRESS
        } else {
            clamped
        }
    };

    ItemProgress {
        status,
        progress,
        total_tasks: total,
        completed,
    }
}
