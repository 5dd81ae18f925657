//! Download scheduler port definition.
//!
//! This port defines the public interface of the download subsystem. It
//! hides the queue, the chain listener and every cache behind a small async
//! API.
//!
//! # Design
//!
//! - Only download domain types in signatures
//! - Background failures never surface here; they show up as
//!   `ProgressStatus::Failed` in progress snapshots
//! - Errors are returned only for unusable input

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::download::{DownloadError, ItemId, ItemProgress, QueueStatus};
use crate::settings::SchedulerSettings;

/// Preference key holding the blocked-item registry.
pub const BLOCKED_ITEMS_KEY: &str = "blocked_download_items";

/// Preference key holding the Wi-Fi-only flag.
pub const WIFI_ONLY_KEY: &str = "download_wifi_only";

/// Configuration for creating a download scheduler.
///
/// Contains the downloads directory and the timing rules of the scheduler.
#[derive(Debug, Clone)]
pub struct DownloadSchedulerConfig {
    /// Directory holding one sub-directory per item.
    pub downloads_directory: PathBuf,
    /// Delay before the chain listener re-reads durable records.
    pub debounce: Duration,
    /// A live running flag older than this is stale.
    pub stale_after: Duration,
    /// Minimum spacing between scheduling attempts for one item.
    pub reschedule_throttle: Duration,
    /// Window after a cancellation during which the queue is not drained.
    pub halt_window: Duration,
    /// Delay before a drain reads durable records.
    pub settle_delay: Duration,
    /// How long a freshly queued or submitted item reports `Running`.
    pub queued_grace: Duration,
    /// Minimum spacing between progress-driven snapshots per item.
    pub progress_interval: Duration,
    /// Preference key of the blocked-item registry.
    pub blocked_items_key: String,
    /// Preference key of the Wi-Fi-only flag.
    pub wifi_only_key: String,
}

impl Default for DownloadSchedulerConfig {
    fn default() -> Self {
        Self {
            downloads_directory: PathBuf::from("."),
            debounce: Duration::from_millis(150),
            stale_after: Duration::from_secs(2),
            reschedule_throttle: Duration::from_millis(750),
            halt_window: Duration::from_millis(1500),
            settle_delay: Duration::from_millis(150),
            queued_grace: Duration::from_secs(3),
            progress_interval: Duration::from_millis(100),
            blocked_items_key: BLOCKED_ITEMS_KEY.to_string(),
            wifi_only_key: WIFI_ONLY_KEY.to_string(),
        }
    }
}

impl DownloadSchedulerConfig {
    /// Create a new config with the downloads directory.
    #[must_use]
    pub fn new(downloads_directory: PathBuf) -> Self {
        Self {
            downloads_directory,
            ..Default::default()
        }
    }

    /// Set the chain listener debounce.
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the live-flag staleness window.
    #[must_use]
    pub const fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Set the per-item reschedule throttle.
    #[must_use]
    pub const fn with_reschedule_throttle(mut self, throttle: Duration) -> Self {
        self.reschedule_throttle = throttle;
        self
    }

    /// Set the post-cancel halt window.
    #[must_use]
    pub const fn with_halt_window(mut self, halt_window: Duration) -> Self {
        self.halt_window = halt_window;
        self
    }

    /// Set the drain settle delay.
    #[must_use]
    pub const fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Set the just-queued grace window.
    #[must_use]
    pub const fn with_queued_grace(mut self, grace: Duration) -> Self {
        self.queued_grace = grace;
        self
    }

    /// Set the blocked-item preference key.
    #[must_use]
    pub fn with_blocked_items_key(mut self, key: impl Into<String>) -> Self {
        self.blocked_items_key = key.into();
        self
    }

    /// Override timings from user settings. Unset fields keep their value.
    #[must_use]
    pub fn apply_settings(mut self, settings: &SchedulerSettings) -> Self {
        let ms = Duration::from_millis;
        if let Some(v) = settings.debounce_ms {
            self.debounce = ms(v);
        }
        if let Some(v) = settings.stale_after_ms {
            self.stale_after = ms(v);
        }
        if let Some(v) = settings.reschedule_throttle_ms {
            self.reschedule_throttle = ms(v);
        }
        if let Some(v) = settings.halt_window_ms {
            self.halt_window = ms(v);
        }
        if let Some(v) = settings.settle_delay_ms {
            self.settle_delay = ms(v);
        }
        if let Some(v) = settings.queued_grace_ms {
            self.queued_grace = ms(v);
        }
        if let Some(dir) = settings.downloads_directory.as_deref() {
            self.downloads_directory = PathBuf::from(dir);
        }
        self
    }
}

/// Port for the download scheduler.
///
/// # Usage
///
/// ```ignore
/// let scheduler: Arc<dyn DownloadSchedulerPort> = /* ... */;
///
/// scheduler.enqueue(ItemId::new("li_1"), None, Some("Dune".into())).await?;
/// let mut progress = scheduler.watch_progress(&ItemId::new("li_1")).await;
/// progress.changed().await?;
///
/// scheduler.cancel(&ItemId::new("li_1")).await?;
/// ```
#[async_trait]
pub trait DownloadSchedulerPort: Send + Sync {
    /// Queue an item for download and clear any block on it.
    ///
    /// Idempotent: an item already queued or in flight is left alone.
    async fn enqueue(
        &self,
        item_id: ItemId,
        episode_id: Option<String>,
        title: Option<String>,
    ) -> Result<(), DownloadError>;

    /// Stop an item: block it, drop it from the queue and cancel its tasks.
    async fn cancel(&self, item_id: &ItemId) -> Result<(), DownloadError>;

    /// Cancel an item and delete every local file it has.
    async fn delete_local(&self, item_id: &ItemId) -> Result<(), DownloadError>;

    /// Clear the queue, block every tracked item and cancel every task.
    async fn cancel_all(&self) -> Result<(), DownloadError>;

    /// Re-queue unfinished items known to the transfer engine.
    ///
    /// Returns the number of items queued.
    async fn resume_all(&self) -> Result<usize, DownloadError>;

    /// Compute a fresh progress snapshot.
    async fn compute_progress(&self, item_id: &ItemId) -> ItemProgress;

    /// Subscribe to progress snapshots of an item.
    async fn watch_progress(&self, item_id: &ItemId) -> watch::Receiver<ItemProgress>;

    /// Items that are queued, activated or in flight.
    async fn list_tracked_item_ids(&self) -> Vec<ItemId>;

    /// Summary of the global queue.
    async fn queue_status(&self) -> QueueStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = DownloadSchedulerConfig::default();
        assert_eq!(config.debounce, Duration::from_millis(150));
        assert_eq!(config.stale_after, Duration::from_secs(2));
        assert_eq!(config.reschedule_throttle, Duration::from_millis(750));
        assert_eq!(config.halt_window, Duration::from_millis(1500));
        assert_eq!(config.blocked_items_key, BLOCKED_ITEMS_KEY);
    }

    #[test]
    fn test_apply_settings_overrides_only_set_fields() {
        let settings = SchedulerSettings {
            halt_window_ms: Some(500),
            downloads_directory: Some("/data/books".to_string()),
            ..Default::default()
        };
        let config = DownloadSchedulerConfig::default().apply_settings(&settings);

        assert_eq!(config.halt_window, Duration::from_millis(500));
        assert_eq!(config.debounce, Duration::from_millis(150));
        assert_eq!(config.downloads_directory, PathBuf::from("/data/books"));
    }
}
