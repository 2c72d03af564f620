use std::time::{Duration, Instant};

/// Minimum spacing between two transport writes
#[derive(Debug, Clone)]
pub struct RateGate {
    min_interval: Duration,
    last_transmit: Option<Instant>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_transmit: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether a write issued at `now` is allowed. Does not record anything.
    pub fn is_open_at(&self, now: Instant) -> bool {
        match self.last_transmit {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        }
    }

    /// Records an actual write. Skipped ticks must not call this.
    pub fn record_transmit(&mut self, now: Instant) {
        self.last_transmit = Some(now);
    }
}
