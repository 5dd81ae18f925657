//! Per-item progress snapshots.

use serde::{Deserialize, Serialize};

/// Aggregated status of an item as shown to the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Nothing known about the item.
    #[default]
    None,
    /// Waiting for the transfer slot.
    Queued,
    /// A track is being transferred.
    Running,
    /// Every track is on disk.
    Complete,
    /// The last transfer failed.
    Failed,
}

impl ProgressStatus {
    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

/// Point-in-time progress of one item. Always recomputed, never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemProgress {
    /// Resolved status.
    pub status: ProgressStatus,
    /// Overall fraction in `[0, 1]`.
    pub progress: f64,
    /// Number of tracks the item has.
    pub total_tasks: u32,
    /// Number of tracks present on disk.
    pub completed: u32,
}

impl ItemProgress {
    /// Snapshot for an item nothing is known about.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            status: ProgressStatus::None,
            progress: 0.0,
            total_tasks: 0,
            completed: 0,
        }
    }

    /// Whether every track is present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.status, ProgressStatus::Complete)
    }

    /// Progress as a whole percentage, for display.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u8 {
        (self.progress.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}
