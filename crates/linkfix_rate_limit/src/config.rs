//! Rate limit configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits for the burst-tolerant windowed counter.
///
/// Deserializes from the `[rate_limit.burst]` table:
///
/// ```toml
/// [rate_limit.burst]
/// max_requests = 5
/// window_ms = 60000
/// burst_allowance = 2
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct BurstPolicy {
    /// Nominal requests per window
    #[serde(default = "default_burst_max_requests")]
    max_requests: usize,
    /// Window length in milliseconds
    #[serde(default = "default_burst_window_ms")]
    window_ms: u64,
    /// Extra requests tolerated on top of `max_requests`
    #[serde(default = "default_burst_allowance")]
    burst_allowance: usize,
}

fn default_burst_max_requests() -> usize {
    5
}

fn default_burst_window_ms() -> u64 {
    60_000
}

fn default_burst_allowance() -> usize {
    2
}

impl BurstPolicy {
    /// Create a policy.
    pub fn new(max_requests: usize, window: Duration, burst_allowance: usize) -> Self {
        Self {
            max_requests,
            window_ms: window.as_millis().min(u64::MAX as u128) as u64,
            burst_allowance,
        }
    }

    /// Total events admitted per window.
    pub fn capacity(&self) -> usize {
        self.max_requests.saturating_add(self.burst_allowance)
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for BurstPolicy {
    fn default() -> Self {
        Self {
            max_requests: default_burst_max_requests(),
            window_ms: default_burst_window_ms(),
            burst_allowance: default_burst_allowance(),
        }
    }
}

/// Configuration for [`RateLimiter`](crate::RateLimiter).
///
/// Deserializes from the `[rate_limit]` table of `linkfix.toml`.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct RateLimitConfig {
    /// Replies per actor allowed by [`RateLimiter::is_allowed`](crate::RateLimiter::is_allowed)
    #[serde(default = "default_max_replies_per_minute")]
    max_replies_per_minute: usize,

    /// Sliding window length in seconds
    #[serde(default = "default_window_secs")]
    window_secs: u64,

    /// Seconds between background sweeps of expired entries
    #[serde(default = "default_cleanup_interval_secs")]
    cleanup_interval_secs: u64,

    /// Default policy for burst-limited actions
    #[serde(default)]
    burst: BurstPolicy,
}

fn default_max_replies_per_minute() -> usize {
    30
}

fn default_window_secs() -> u64 {
    60
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

impl RateLimitConfig {
    /// Sliding window length.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Interval of the background sweep.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_replies_per_minute: default_max_replies_per_minute(),
            window_secs: default_window_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            burst: BurstPolicy::default(),
        }
    }
}
