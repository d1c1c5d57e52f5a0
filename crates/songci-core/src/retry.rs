//! Bounded retry with exponential backoff

use std::time::Duration;

/// Attempt budget and backoff schedule for a fallible operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Exponential backoff: base * 2^attempt (1s, 2s, 4s, ... with the default base)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Worst-case total sleep across a fully failing run.
    pub fn worst_case_delay(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|i| self.backoff_duration(i))
            .sum()
    }
}

/// Retry a fallible operation with exponential backoff.
///
/// `attempt_fn` receives the zero-based attempt number. Runs at most
/// `policy.max_attempts` times and sleeps only between attempts.
///
/// Returns `Ok(T)` on first success, or the last `Err` on exhaustion.
pub fn retry_with_backoff<T, E: std::fmt::Display>(
    label: &str,
    policy: &RetryPolicy,
    mut attempt_fn: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        match attempt_fn(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if attempt + 1 < max_attempts => {
                let delay = policy.backoff_duration(attempt);
                attempt += 1;
                log::warn!("{label}: attempt {attempt}/{max_attempts} failed: {e}, retrying in {delay:?}");
                std::thread::sleep(delay);
            }
            Err(e) => {
                log::debug!("{label}: giving up after {max_attempts} attempts: {e}");
                return Err(e);
            }
        }
    }
}
