//! Minimum-spacing rate limiter shared by all workers.
//!
//! Uses `Mutex` from std: the guard is held across the sleep, so callers
//! serialize and the aggregate rate never exceeds the configured limit,
//! regardless of how many workers call [`RateLimiter::acquire`].

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Enforces `60 / requests_per_minute` seconds between granted acquisitions.
pub struct RateLimiter {
    interval: Duration,
    last_granted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for `requests_per_minute` (must be non-zero).
    pub fn new(requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        Self::with_interval(Duration::from_secs_f64(60.0 / f64::from(rpm)))
    }

    /// Create a limiter with an explicit spacing between grants.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last_granted: Mutex::new(None),
        }
    }

    /// Minimum spacing between two grants.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until `interval` has passed since the previous grant, then grant.
    ///
    /// Returns the instant recorded for this grant. The first call never waits.
    pub fn acquire(&self) -> Instant {
        // Sleeping never panics, so a poisoned guard still holds a valid instant
        let mut last = self
            .last_granted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        let now = Instant::now();
        *last = Some(now);
        now
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
