//! Per-actor rate limiting and action cooldowns.
//!
//! Every bot feature asks the [`RateLimiter`] whether an actor may proceed
//! before doing any work. Three limiter flavors share one in-memory state:
//!
//! - **Sliding window** ([`RateLimiter::check_rate_limit`]): at most N events
//!   per actor within a lookback window
//! - **Cooldowns** ([`RateLimiter::set_cooldown`] / [`RateLimiter::check_cooldown`]):
//!   one expiry timer per (actor, action)
//! - **Burst window** ([`RateLimiter::check_burst_limit`]): a sliding window per
//!   (actor, action) with extra burst capacity, reporting when to retry
//!
//! Expired entries are deleted lazily when read, and a background sweep
//! ([`RateLimiter::start_cleanup`]) bounds memory for actors who never come back.
//!
//! Nothing here is persisted; a restart clears all limits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod cooldown;
mod decision;
mod limiter;

pub use config::{BurstPolicy, RateLimitConfig};
pub use cooldown::CooldownStatus;
pub use decision::BurstDecision;
pub use limiter::{RateLimiter, RateLimiterStats};
