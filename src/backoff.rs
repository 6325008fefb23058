//! Retry delay for the polling loop.
//!
//! The delay starts at `initial`, doubles on every failed fetch up to `max`,
//! and snaps back to `initial` on the first success. There is no jitter and
//! no retry limit.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    #[allow(dead_code)]
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Record a failure and return the delay to wait before retrying.
    pub fn on_failure(&mut self) -> Duration {
        self.current = self
            .current
            .saturating_mul(2)
            .clamp(self.initial, self.max);
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
