//! The rate limiter.

use crate::{BurstDecision, BurstPolicy, CooldownStatus, RateLimitConfig};
use derive_getters::Getters;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Stand-in expiry for durations too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + duration`, clamped to [`FAR_FUTURE`] when that would overflow.
fn deadline(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Cooldowns and burst histories are tracked per (actor, action).
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{}:{}", actor, action)]
struct ActionKey {
    actor: String,
    action: String,
}

impl ActionKey {
    fn new(actor: &str, action: &str) -> Self {
        Self {
            actor: actor.to_string(),
            action: action.to_string(),
        }
    }
}

/// Event timestamps inside a lookback window, oldest first.
#[derive(Debug)]
struct SlidingWindow {
    events: VecDeque<Instant>,
    window: Duration,
}

impl SlidingWindow {
    fn new(window: Duration) -> Self {
        Self {
            events: VecDeque::new(),
            window,
        }
    }

    /// Drop events at least `window` old.
    fn prune(&mut self, now: Instant, window: Duration) {
        self.window = window;
        while let Some(&oldest) = self.events.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// No event in the most recent window.
    fn is_idle(&self, now: Instant) -> bool {
        self.events
            .back()
            .is_none_or(|&newest| now.saturating_duration_since(newest) >= self.window)
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    cooldowns: HashMap<ActionKey, Instant>,
    windows: HashMap<String, SlidingWindow>,
    bursts: HashMap<ActionKey, SlidingWindow>,
}

struct CleanupTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct RateLimiterInner {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
    cleanup_task: Mutex<Option<CleanupTask>>,
}

/// Snapshot of limiter occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Getters)]
pub struct RateLimiterStats {
    /// Cooldowns still blocking their action
    active_cooldowns: usize,
    /// Lapsed cooldowns not yet swept
    expired_cooldowns: usize,
    /// Actors with a sliding window history
    actors_with_history: usize,
    /// All cooldown entries, active or lapsed
    total_cooldown_entries: usize,
    /// (actor, action) pairs with a burst history
    burst_histories: usize,
    /// Whether a sweep would remove anything
    cleanup_needed: bool,
}

/// In-memory limiter shared by every handler.
///
/// Cloning is cheap; clones share state. All operations are synchronous and
/// lock a single mutex briefly, so checks made from concurrent tasks are
/// serialized and a window can never admit more events than its limit.
///
/// # Example
///
/// ```
/// use linkfix_rate_limit::{RateLimitConfig, RateLimiter};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = RateLimiter::new(RateLimitConfig::default());
/// assert!(limiter.check_rate_limit("alice", 2, Duration::from_secs(60)));
/// assert!(limiter.check_rate_limit("alice", 2, Duration::from_secs(60)));
/// assert!(!limiter.check_rate_limit("alice", 2, Duration::from_secs(60)));
///
/// limiter.set_cooldown("alice", "macro", Duration::from_secs(30));
/// assert!(limiter.check_cooldown("alice", "macro").is_on_cooldown());
/// # }
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

impl RateLimiter {
    /// Create a limiter with empty state.
    pub fn new(config: RateLimitConfig) -> Self {
        debug!(
            max_replies_per_minute = config.max_replies_per_minute(),
            window_secs = config.window_secs(),
            "Creating rate limiter"
        );
        Self {
            inner: Arc::new(RateLimiterInner {
                config,
                state: Mutex::new(LimiterState::default()),
                cleanup_task: Mutex::new(None),
            }),
        }
    }

    /// Limiter configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.inner.config
    }

    /// Record an event for `actor` if fewer than `max_events` fall within
    /// the last `window`.
    ///
    /// Denied attempts are not recorded, so a flood of rejected requests does
    /// not extend the lockout.
    pub fn check_rate_limit(&self, actor: &str, max_events: usize, window: Duration) -> bool {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let history = state
            .windows
            .entry(actor.to_string())
            .or_insert_with(|| SlidingWindow::new(window));
        history.prune(now, window);

        if history.events.len() >= max_events {
            warn!(actor, max_events, window_ms = window.as_millis() as u64, "Rate limit exceeded");
            return false;
        }

        history.events.push_back(now);
        true
    }

    /// [`check_rate_limit`](Self::check_rate_limit) with the configured
    /// reply limit and window.
    pub fn is_allowed(&self, actor: &str) -> bool {
        let config = &self.inner.config;
        self.check_rate_limit(actor, *config.max_replies_per_minute(), config.window())
    }

    /// Block `action` for `actor` for `duration` from now, replacing any
    /// existing cooldown.
    pub fn set_cooldown(&self, actor: &str, action: &str, duration: Duration) {
        let key = ActionKey::new(actor, action);
        debug!(key = %key, duration_ms = duration.as_millis() as u64, "Cooldown set");
        self.inner
            .state
            .lock()
            .cooldowns
            .insert(key, deadline(Instant::now(), duration));
    }

    /// Whether `action` is blocked for `actor`.
    ///
    /// A lapsed cooldown is removed as it is read.
    pub fn check_cooldown(&self, actor: &str, action: &str) -> CooldownStatus {
        let key = ActionKey::new(actor, action);
        let now = Instant::now();
        let mut state = self.inner.state.lock();

        match state.cooldowns.get(&key).copied() {
            None => CooldownStatus::Ready,
            Some(expires_at) if expires_at <= now => {
                state.cooldowns.remove(&key);
                CooldownStatus::Ready
            }
            Some(expires_at) => CooldownStatus::Active {
                remaining: expires_at - now,
            },
        }
    }

    /// Lift a cooldown early. Returns whether one existed.
    pub fn clear_cooldown(&self, actor: &str, action: &str) -> bool {
        let key = ActionKey::new(actor, action);
        self.inner.state.lock().cooldowns.remove(&key).is_some()
    }

    /// Cooldown status of several actions at once, keyed by action.
    pub fn cooldown_statuses<I, S>(&self, actor: &str, actions: I) -> HashMap<String, CooldownStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        actions
            .into_iter()
            .map(|action| {
                let action = action.as_ref();
                (action.to_string(), self.check_cooldown(actor, action))
            })
            .collect()
    }

    /// Windowed counter per (actor, action) admitting up to
    /// `max_requests + burst_allowance` events per window.
    ///
    /// A denial reports how long until the oldest counted event ages out,
    /// which is exactly when the next request would be admitted.
    pub fn check_burst_limit(&self, actor: &str, action: &str, policy: &BurstPolicy) -> BurstDecision {
        let key = ActionKey::new(actor, action);
        let capacity = policy.capacity();
        let window = policy.window();
        let now = Instant::now();

        let mut state = self.inner.state.lock();
        let history = state
            .bursts
            .entry(key)
            .or_insert_with(|| SlidingWindow::new(window));
        history.prune(now, window);

        let usage = history.events.len();
        if usage >= capacity {
            let retry_after = usage
                .checked_sub(capacity)
                .and_then(|index| history.events.get(index))
                .map(|&oldest| deadline(oldest, window).saturating_duration_since(now))
                .unwrap_or(window);
            warn!(
                actor,
                action,
                usage,
                capacity,
                retry_after_ms = retry_after.as_millis() as u64,
                "Burst limit exceeded"
            );
            return BurstDecision::Denied {
                retry_after,
                current_usage: usage,
            };
        }

        history.events.push_back(now);
        BurstDecision::Allowed {
            current_usage: usage + 1,
            remaining_requests: capacity - usage - 1,
        }
    }

    /// [`check_burst_limit`](Self::check_burst_limit) with the configured policy.
    pub fn check_burst(&self, actor: &str, action: &str) -> BurstDecision {
        let policy = *self.inner.config.burst();
        self.check_burst_limit(actor, action, &policy)
    }

    /// Remove every lapsed cooldown. Returns how many were removed.
    pub fn cleanup_expired_cooldowns(&self) -> usize {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let before = state.cooldowns.len();
        state.cooldowns.retain(|_, expires_at| *expires_at > now);
        let removed = before - state.cooldowns.len();

        if removed > 0 {
            debug!(removed, "Cleaned up expired cooldowns");
        }
        removed
    }

    /// Remove window histories with no event inside their window.
    /// Returns how many were removed.
    pub fn prune_idle_histories(&self) -> usize {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let before = state.windows.len() + state.bursts.len();
        state.windows.retain(|_, history| !history.is_idle(now));
        state.bursts.retain(|_, history| !history.is_idle(now));
        let removed = before - state.windows.len() - state.bursts.len();

        if removed > 0 {
            debug!(removed, "Pruned idle rate limit histories");
        }
        removed
    }

    /// Forget every cooldown and history belonging to `actor`.
    #[instrument(skip(self))]
    pub fn reset_user_limits(&self, actor: &str) {
        let mut state = self.inner.state.lock();
        state.cooldowns.retain(|key, _| key.actor != actor);
        state.bursts.retain(|key, _| key.actor != actor);
        state.windows.remove(actor);
        info!("Reset rate limits");
    }

    /// Current occupancy.
    pub fn stats(&self) -> RateLimiterStats {
        let now = Instant::now();
        let state = self.inner.state.lock();
        let expired_cooldowns = state
            .cooldowns
            .values()
            .filter(|&&expires_at| expires_at <= now)
            .count();
        let total_cooldown_entries = state.cooldowns.len();

        RateLimiterStats {
            active_cooldowns: total_cooldown_entries - expired_cooldowns,
            expired_cooldowns,
            actors_with_history: state.windows.len(),
            total_cooldown_entries,
            burst_histories: state.bursts.len(),
            cleanup_needed: expired_cooldowns > 0,
        }
    }

    /// Spawn the periodic sweep of lapsed cooldowns and idle histories.
    ///
    /// Must be called from within a Tokio runtime. Calling it while the sweep
    /// is already running does nothing.
    pub fn start_cleanup(&self) {
        let mut task = self.inner.cleanup_task.lock();
        if task.is_some() {
            warn!("Rate limiter cleanup already running");
            return;
        }

        let period = self
            .inner
            .config
            .cleanup_interval()
            .max(Duration::from_secs(1));
        let (shutdown, mut stop) = watch::channel(false);
        let limiter = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let cooldowns = limiter.cleanup_expired_cooldowns();
                        let histories = limiter.prune_idle_histories();
                        if cooldowns + histories > 0 {
                            debug!(cooldowns, histories, "Rate limiter sweep complete");
                        }
                    }
                    _ = stop.changed() => break,
                }
            }

            debug!("Rate limiter cleanup stopped");
        });

        *task = Some(CleanupTask { shutdown, handle });
        info!(interval_secs = period.as_secs(), "Rate limiter cleanup started");
    }

    /// Whether the periodic sweep is running.
    pub fn is_cleanup_running(&self) -> bool {
        self.inner.cleanup_task.lock().is_some()
    }

    /// Stop the periodic sweep and wait for it to exit.
    pub async fn stop_cleanup(&self) {
        let task = self.inner.cleanup_task.lock().take();
        if let Some(CleanupTask { shutdown, handle }) = task {
            let _ = shutdown.send(true);
            if let Err(e) = handle.await {
                warn!(error = %e, "Rate limiter cleanup ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_prune_drops_events_at_boundary() {
        let start = Instant::now();
        let window = Duration::from_secs(10);
        let mut history = SlidingWindow::new(window);
        history.events.push_back(start);
        history.events.push_back(start + Duration::from_secs(5));

        history.prune(start + Duration::from_secs(10), window);
        assert_eq!(history.events.len(), 1);
        assert!(!history.is_idle(start + Duration::from_secs(10)));
        assert!(history.is_idle(start + Duration::from_secs(15)));
    }

    #[test]
    fn test_deadline_clamps_overflow() {
        let now = Instant::now();
        assert_eq!(deadline(now, Duration::from_secs(5)), now + Duration::from_secs(5));
        assert_eq!(deadline(now, Duration::MAX), now + FAR_FUTURE);
    }

    #[test]
    fn test_empty_window_is_idle() {
        let history = SlidingWindow::new(Duration::from_secs(1));
        assert!(history.is_idle(Instant::now()));
    }

    #[test]
    fn test_action_key_display() {
        assert_eq!(ActionKey::new("alice", "macro").to_string(), "alice:macro");
    }
}
