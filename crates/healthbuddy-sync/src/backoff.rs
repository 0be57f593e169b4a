//! Retry cap and backoff curve
//!
//! Transient failures are retried with exponential backoff:
//! `base * 2^retry_count`, capped at `max`. With the defaults (base 1s,
//! max 300s) the delays after the first, second and third failure are
//! 2s, 4s and 8s. Once an operation's retry count reaches the cap it is
//! evicted instead of retried.

use std::time::Duration;

use healthbuddy_core::config::SyncConfig;

/// Default number of transient failures before eviction
pub const DEFAULT_RETRY_CAP: u32 = 3;

/// Retry policy applied by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    cap: u32,
    base: Duration,
    max: Duration,
}

impl RetryPolicy {
    /// Creates a policy; `max` is raised to `base` if smaller
    pub fn new(cap: u32, base: Duration, max: Duration) -> Self {
        Self {
            cap: cap.max(1),
            base,
            max: max.max(base),
        }
    }

    /// Failures tolerated before eviction
    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// Returns true once `retry_count` has reached the cap
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.cap
    }

    /// Delay before the next automatic attempt after `retry_count` failures
    ///
    /// Monotone non-decreasing in `retry_count` and never above `max`.
    pub fn delay(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_CAP,
            Duration::from_secs(1),
            Duration::from_secs(300),
        )
    }
}

impl From<&SyncConfig> for RetryPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self::new(
            config.retry_cap,
            Duration::from_secs(config.backoff_base_secs),
            Duration::from_secs(config.backoff_max_secs),
        )
    }
}
