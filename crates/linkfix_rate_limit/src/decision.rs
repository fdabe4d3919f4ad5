//! Burst limiter decisions.

use crate::cooldown::{ceil_seconds, duration_ms};
use std::time::Duration;

/// Result of [`RateLimiter::check_burst_limit`](crate::RateLimiter::check_burst_limit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstDecision {
    /// The request was admitted and recorded.
    Allowed {
        /// Events in the window, including this one
        current_usage: usize,
        /// Events still admissible in the window
        remaining_requests: usize,
    },
    /// The request was rejected and not recorded.
    Denied {
        /// Time until the oldest counted event leaves the window
        retry_after: Duration,
        /// Events in the window
        current_usage: usize,
    },
}

impl BurstDecision {
    /// Whether the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, BurstDecision::Allowed { .. })
    }

    /// Events counted in the window.
    pub fn current_usage(&self) -> usize {
        match self {
            BurstDecision::Allowed { current_usage, .. }
            | BurstDecision::Denied { current_usage, .. } => *current_usage,
        }
    }

    /// Wait before retrying, for denied requests.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BurstDecision::Allowed { .. } => None,
            BurstDecision::Denied { retry_after, .. } => Some(*retry_after),
        }
    }

    /// Wait before retrying in milliseconds, for denied requests.
    pub fn remaining_ms(&self) -> Option<u64> {
        self.retry_after().map(duration_ms)
    }

    /// Wait before retrying in seconds, rounded up, for denied requests.
    pub fn remaining_seconds(&self) -> Option<u64> {
        self.retry_after().map(ceil_seconds)
    }
}
