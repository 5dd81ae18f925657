//! Download event emitter port.

use crate::download::DownloadEvent;

/// Sink for [`DownloadEvent`]s.
///
/// The scheduler calls `emit` while it holds no locks, but implementations
/// must still return quickly: forward to a channel or drop the event.
pub trait DownloadEventEmitterPort: Send + Sync {
    fn emit(&self, event: DownloadEvent);
}

/// Emitter for hosts that only read progress through watch channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDownloadEmitter;

impl NoopDownloadEmitter {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DownloadEventEmitterPort for NoopDownloadEmitter {
    fn emit(&self, _event: DownloadEvent) {}
}
