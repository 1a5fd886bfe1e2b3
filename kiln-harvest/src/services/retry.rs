//! Retry budget and backoff schedule
//!
//! Backoff doubles after every failed attempt, so each wait is strictly longer
//! than the one before it:
//! - after attempt 0: `base`
//! - after attempt 1: `base * 2`
//! - after attempt n: `base * 2^n`
//!
//! The budget is capped at [`MAX_ATTEMPTS`] so the doubling never saturates.

use std::time::Duration;

/// Largest attempt budget a policy accepts
pub const MAX_ATTEMPTS: u32 = 16;

/// Attempt budget plus exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to `1..=MAX_ATTEMPTS`
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            base_delay,
        }
    }

    /// Single attempt, no retry
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Whether another attempt may follow attempt `attempt` (0-based)
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Wait before the attempt following attempt `attempt` (0-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_secs(2))
    }
}
