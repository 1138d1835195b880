//! Stall watchdog
//!
//! A send path can wedge without ever returning an error. The watchdog
//! catches that by bounding the time between successful sends.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    timeout: Duration,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True once strictly more than `timeout` has passed since `last_send`
    pub fn is_expired(&self, last_send: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_send) > self.timeout
    }
}
