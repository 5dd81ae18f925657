//! Download events - discriminated union for all download state changes.

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;
use super::progress::ItemProgress;
use super::queue::QueueStatus;
use super::types::ItemId;

/// Single discriminated union for all download events.
///
/// Frontends handle this as a tagged union:
///
/// ```typescript
/// type DownloadEvent =
///   | { type: "queue_changed"; status: QueueStatus }
///   | { type: "item_progress"; item_id: string; progress: ItemProgress }
///   | { type: "item_started"; item_id: string; title: string }
///   | { type: "item_completed"; item_id: string; title: string }
///   | { type: "item_failed"; item_id: string; error: string }
///   | { type: "item_canceled"; item_id: string };
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// The queue membership or blocked set changed.
    QueueChanged {
        /// Current queue summary.
        status: QueueStatus,
    },

    /// Fresh progress snapshot for an item.
    ItemProgress {
        /// Item the snapshot belongs to.
        item_id: ItemId,
        /// The snapshot.
        progress: ItemProgress,
    },

    /// The first track of an item was submitted.
    ItemStarted {
        /// Item that started.
        item_id: ItemId,
        /// Display title.
        title: String,
    },

    /// Every track of an item is on disk.
    ItemCompleted {
        /// Item that completed.
        item_id: ItemId,
        /// Display title.
        title: String,
    },

    /// An item stopped because a transfer failed.
    ItemFailed {
        /// Item that failed.
        item_id: ItemId,
        /// Human readable error.
        error: String,
        /// Whether enqueueing the item again may succeed.
        retryable: bool,
    },

    /// An item was canceled by the user.
    ItemCanceled {
        /// Item that was canceled.
        item_id: ItemId,
    },
}

impl DownloadEvent {
    /// Create a queue changed event.
    #[must_use]
    pub const fn queue_changed(status: QueueStatus) -> Self {
        Self::QueueChanged { status }
    }

    /// Create a progress event.
    #[must_use]
    pub const fn progress(item_id: ItemId, progress: ItemProgress) -> Self {
        Self::ItemProgress { item_id, progress }
    }

    /// Create a started event.
    pub fn started(item_id: ItemId, title: impl Into<String>) -> Self {
        Self::ItemStarted {
            item_id,
            title: title.into(),
        }
    }

    /// Create a completed event.
    pub fn completed(item_id: ItemId, title: impl Into<String>) -> Self {
        Self::ItemCompleted {
            item_id,
            title: title.into(),
        }
    }

    /// Create a failed event from the error that stopped the item.
    #[must_use]
    pub fn failed(item_id: ItemId, error: &DownloadError) -> Self {
        Self::ItemFailed {
            item_id,
            error: error.user_message(),
            retryable: error.is_recoverable(),
        }
    }

    /// Create a canceled event.
    #[must_use]
    pub const fn canceled(item_id: ItemId) -> Self {
        Self::ItemCanceled { item_id }
    }

    /// Get the item id this event refers to (if any).
    #[must_use]
    pub const fn item_id(&self) -> Option<&ItemId> {
        match self {
            Self::QueueChanged { .. } => None,
            Self::ItemProgress { item_id, .. }
            | Self::ItemStarted { item_id, .. }
            | Self::ItemCompleted { item_id, .. }
            | Self::ItemFailed { item_id, .. }
            | Self::ItemCanceled { item_id } => Some(item_id),
        }
    }

    /// Get the event name for transport layers.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::QueueChanged { .. } => "download:queue_changed",
            Self::ItemProgress { .. } => "download:item_progress",
            Self::ItemStarted { .. } => "download:item_started",
            Self::ItemCompleted { .. } => "download:item_completed",
            Self::ItemFailed { .. } => "download:item_failed",
            Self::ItemCanceled { .. } => "download:item_canceled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_extraction() {
        let id = ItemId::new("b1");
        assert_eq!(DownloadEvent::canceled(id.clone()).item_id(), Some(&id));
        assert!(
            DownloadEvent::queue_changed(QueueStatus::default())
                .item_id()
                .is_none()
        );
    }

    #[test]
    fn test_event_tagging() {
        let event = DownloadEvent::completed(ItemId::new("b1"), "Dune");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "item_completed");
        assert_eq!(json["item_id"], "b1");
        assert_eq!(event.event_name(), "download:item_completed");
    }

    #[test]
    fn test_failed_event_carries_retry_hint() {
        let id = ItemId::new("b1");
        let event = DownloadEvent::failed(id.clone(), &DownloadError::transfer_failed("b1", 0));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "item_failed");
        assert_eq!(json["retryable"], true);
        assert_eq!(json["error"], "Track 1 could not be downloaded.");

        let DownloadEvent::ItemFailed { retryable, .. } =
            DownloadEvent::failed(id, &DownloadError::invalid_item(".."))
        else {
            panic!("expected ItemFailed");
        };
        assert!(!retryable);
    }
}
