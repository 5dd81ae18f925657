//! Progress throttling.
//!
//! Rate-limits progress-driven snapshots so a chatty engine does not flood
//! watchers and event listeners.

use std::time::Duration;

use tokio::time::Instant;

/// Per-item rate limiter for progress snapshots.
///
/// Status changes call [`reset`](Self::reset) so they always publish.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    /// Create a new throttle with the specified minimum interval.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
        }
    }

    /// Check if enough time has passed to emit another progress update.
    pub fn should_emit(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    /// Force the next check to return true.
    pub const fn reset(&mut self) {
        self.last_emit = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_first_emit() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(100));
        assert!(throttle.should_emit(Instant::now()));
    }

    #[test]
    fn test_throttle_respects_interval() {
        let start = Instant::now();
        let mut throttle = ProgressThrottle::new(Duration::from_millis(50));
        assert!(throttle.should_emit(start));
        assert!(!throttle.should_emit(start + Duration::from_millis(10)));
        assert!(throttle.should_emit(start + Duration::from_millis(60)));
    }

    #[test]
    fn test_throttle_reset() {
        let now = Instant::now();
        let mut throttle = ProgressThrottle::new(Duration::from_millis(100));
        throttle.should_emit(now);
        assert!(!throttle.should_emit(now));

        throttle.reset();
        assert!(throttle.should_emit(now));
    }
}
