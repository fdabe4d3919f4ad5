//! Cooldown status.

use std::time::Duration;

/// Result of [`RateLimiter::check_cooldown`](crate::RateLimiter::check_cooldown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    /// No cooldown, or it has lapsed
    Ready,
    /// The action is blocked for `remaining` longer
    Active {
        /// Time until the cooldown lapses
        remaining: Duration,
    },
}

impl CooldownStatus {
    /// Whether the action is currently blocked.
    pub fn is_on_cooldown(&self) -> bool {
        matches!(self, CooldownStatus::Active { .. })
    }

    /// Time left, zero when ready.
    pub fn remaining(&self) -> Duration {
        match self {
            CooldownStatus::Ready => Duration::ZERO,
            CooldownStatus::Active { remaining } => *remaining,
        }
    }

    /// Time left in whole milliseconds.
    pub fn remaining_ms(&self) -> u64 {
        duration_ms(self.remaining())
    }

    /// Time left in seconds, rounded up.
    ///
    /// ```
    /// use linkfix_rate_limit::CooldownStatus;
    /// use std::time::Duration;
    ///
    /// let status = CooldownStatus::Active { remaining: Duration::from_millis(1001) };
    /// assert_eq!(status.remaining_seconds(), 2);
    /// assert_eq!(CooldownStatus::Ready.remaining_seconds(), 0);
    /// ```
    pub fn remaining_seconds(&self) -> u64 {
        ceil_seconds(self.remaining())
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}

pub(crate) fn ceil_seconds(duration: Duration) -> u64 {
    duration_ms(duration).div_ceil(1000)
}
