//! Timing guards.
//!
//! All guards take the current instant explicitly so the scheduler can use
//! one clock reading per decision and tests can drive them directly.

use std::time::Duration;

use tokio::time::Instant;

/// Window after a cancellation during which nothing new is scheduled.
#[derive(Debug, Clone)]
pub struct HaltWindow {
    length: Duration,
    until: Option<Instant>,
}

impl HaltWindow {
    pub const fn new(length: Duration) -> Self {
        Self {
            length,
            until: None,
        }
    }

    /// (Re)start the window at `now`.
    pub fn start(&mut self, now: Instant) {
        self.until = Some(now + self.length);
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    /// Time left, if the window is active.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }
}

/// Live event cache for the task an item is transferring.
///
/// The running flag is set by engine events and is only trusted while events
/// keep arriving; see [`LiveActivity::is_stale`].
#[derive(Debug, Clone, Default)]
pub struct LiveActivity {
    running: bool,
    fraction: Option<f64>,
    last_event_at: Option<Instant>,
}

impl LiveActivity {
    /// Record a progress event.
    pub fn record_progress(&mut self, fraction: f64, now: Instant) {
        self.running = true;
        self.fraction = Some(fraction.clamp(0.0, 1.0));
        self.last_event_at = Some(now);
    }

    /// Record a status event. Active statuses keep the flag up, terminal
    /// ones drop it along with the fraction.
    pub fn record_status(&mut self, active: bool, now: Instant) {
        self.running = active;
        if !active {
            self.fraction = None;
        }
        self.last_event_at = Some(now);
    }

    /// Whether the running flag is set (stale or not).
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// A set flag that has seen no event for longer than `stale_after`.
    pub fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
        self.running
            && self
                .last_event_at
                .is_none_or(|at| now.saturating_duration_since(at) > stale_after)
    }

    /// Running and not stale.
    pub fn is_live(&self, now: Instant, stale_after: Duration) -> bool {
        self.running && !self.is_stale(now, stale_after)
    }

    /// Fraction of the current track, unless missing or stale.
    pub fn fraction(&self, now: Instant, stale_after: Duration) -> Option<f64> {
        if self.is_stale(now, stale_after) {
            return None;
        }
        self.fraction
    }

    /// Drop the flag and the cached fraction.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Minimum spacing between schedule attempts of one item.
#[derive(Debug, Clone)]
pub struct RescheduleGate {
    spacing: Duration,
    last_attempt: Option<Instant>,
}

impl RescheduleGate {
    pub const fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_attempt: None,
        }
    }

    /// How long to wait before the next attempt is allowed.
    pub fn wait_remaining(&self, now: Instant) -> Duration {
        self.last_attempt.map_or(Duration::ZERO, |at| {
            (at + self.spacing).saturating_duration_since(now)
        })
    }

    /// Record an attempt at `now`.
    pub fn mark(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: fn(u64) -> Duration = Duration::from_millis;

    #[test]
    fn test_halt_window() {
        let now = Instant::now();
        let mut halt = HaltWindow::new(MS(1500));
        assert!(!halt.is_active(now));
        assert_eq!(halt.remaining(now), None);

        halt.start(now);
        assert!(halt.is_active(now + MS(1499)));
        assert_eq!(halt.remaining(now + MS(500)), Some(MS(1000)));
        assert!(!halt.is_active(now + MS(1500)));
    }

    #[test]
    fn test_live_activity_goes_stale() {
        let now = Instant::now();
        let stale_after = MS(2000);
        let mut live = LiveActivity::default();
        assert!(!live.is_live(now, stale_after));

        live.record_progress(0.4, now);
        assert!(live.is_live(now + MS(2000), stale_after));
        assert_eq!(live.fraction(now, stale_after), Some(0.4));

        assert!(live.is_stale(now + MS(2001), stale_after));
        assert_eq!(live.fraction(now + MS(2001), stale_after), None);
        assert!(live.is_running());

        live.clear();
        assert!(!live.is_running());
    }

    #[test]
    fn test_terminal_status_drops_flag() {
        let now = Instant::now();
        let mut live = LiveActivity::default();
        live.record_progress(0.9, now);
        live.record_status(false, now);

        assert!(!live.is_running());
        assert!(!live.is_stale(now + MS(10_000), MS(2000)));
        assert_eq!(live.fraction(now, MS(2000)), None);
    }

    #[test]
    fn test_reschedule_gate() {
        let now = Instant::now();
        let mut gate = RescheduleGate::new(MS(750));
        assert_eq!(gate.wait_remaining(now), Duration::ZERO);

        gate.mark(now);
        assert_eq!(gate.wait_remaining(now + MS(250)), MS(500));
        assert_eq!(gate.wait_remaining(now + MS(900)), Duration::ZERO);
    }
}
