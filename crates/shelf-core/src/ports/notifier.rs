//! Notification sink port.
//!
//! Local notifications are presented by the platform layer. The scheduler
//! only tells it what happened; delivery is fire-and-forget.

/// Port for user-visible download notifications.
pub trait DownloadNotifierPort: Send + Sync {
    /// The first track of an item started downloading.
    fn on_download_started(&self, title: &str);

    /// Every track of an item is on disk.
    fn on_download_complete(&self, title: &str);

    /// The user canceled one or more downloads.
    fn on_download_canceled(&self);
}

/// A notifier that discards everything, for headless contexts and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl DownloadNotifierPort for NoopNotifier {
    fn on_download_started(&self, _title: &str) {}

    fn on_download_complete(&self, _title: &str) {}

    fn on_download_canceled(&self) {}
}
