//! Tests for the sliding window, cooldown and burst limiters.
//!
//! All tests run on a paused clock so window edges are exact.

use linkfix_rate_limit::{BurstDecision, BurstPolicy, CooldownStatus, RateLimitConfig, RateLimiter};
use std::time::Duration;
use tokio::time::advance;

fn limiter() -> RateLimiter {
    RateLimiter::new(RateLimitConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_sliding_window_admits_after_oldest_ages_out() {
    let limiter = limiter();
    let window = Duration::from_secs(60);

    assert!(limiter.check_rate_limit("alice", 3, window));
    advance(Duration::from_secs(1)).await;
    assert!(limiter.check_rate_limit("alice", 3, window));
    advance(Duration::from_secs(1)).await;
    assert!(limiter.check_rate_limit("alice", 3, window));
    advance(Duration::from_secs(1)).await;
    assert!(!limiter.check_rate_limit("alice", 3, window));

    // The first event was at t=0; at t=60 it leaves the window.
    advance(Duration::from_secs(57)).await;
    assert!(limiter.check_rate_limit("alice", 3, window));
    assert!(!limiter.check_rate_limit("alice", 3, window));
}

#[tokio::test(start_paused = true)]
async fn test_denied_attempts_do_not_extend_lockout() {
    let limiter = limiter();
    let window = Duration::from_secs(10);

    assert!(limiter.check_rate_limit("bob", 1, window));
    for _ in 0..5 {
        advance(Duration::from_secs(1)).await;
        assert!(!limiter.check_rate_limit("bob", 1, window));
    }

    advance(Duration::from_secs(5)).await;
    assert!(limiter.check_rate_limit("bob", 1, window));
}

#[tokio::test(start_paused = true)]
async fn test_windows_are_per_actor() {
    let limiter = limiter();
    let window = Duration::from_secs(60);

    assert!(limiter.check_rate_limit("alice", 1, window));
    assert!(!limiter.check_rate_limit("alice", 1, window));
    assert!(limiter.check_rate_limit("bob", 1, window));
}

#[tokio::test(start_paused = true)]
async fn test_is_allowed_uses_configured_limit() {
    let limiter = RateLimiter::new(RateLimitConfig::default().with_max_replies_per_minute(2));

    assert!(limiter.is_allowed("carol"));
    assert!(limiter.is_allowed("carol"));
    assert!(!limiter.is_allowed("carol"));

    advance(Duration::from_secs(60)).await;
    assert!(limiter.is_allowed("carol"));
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_reports_remaining_and_expires() {
    let limiter = limiter();
    limiter.set_cooldown("alice", "macro", Duration::from_secs(60));

    let status = limiter.check_cooldown("alice", "macro");
    assert!(status.is_on_cooldown());
    assert_eq!(status.remaining_seconds(), 60);
    assert_eq!(status.remaining_ms(), 60_000);

    advance(Duration::from_millis(500)).await;
    let status = limiter.check_cooldown("alice", "macro");
    assert_eq!(status.remaining_ms(), 59_500);
    assert_eq!(status.remaining_seconds(), 60);

    advance(Duration::from_millis(59_500)).await;
    assert_eq!(limiter.check_cooldown("alice", "macro"), CooldownStatus::Ready);
    // The lapsed entry was removed by the read.
    assert_eq!(*limiter.stats().total_cooldown_entries(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cooldowns_are_per_action() {
    let limiter = limiter();
    limiter.set_cooldown("alice", "macro", Duration::from_secs(30));

    assert!(!limiter.check_cooldown("alice", "rpg_combat").is_on_cooldown());
    assert!(!limiter.check_cooldown("bob", "macro").is_on_cooldown());

    let statuses = limiter.cooldown_statuses("alice", ["macro", "rpg_combat"]);
    assert!(statuses["macro"].is_on_cooldown());
    assert_eq!(statuses["rpg_combat"], CooldownStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_set_cooldown_replaces_existing() {
    let limiter = limiter();
    limiter.set_cooldown("alice", "macro", Duration::from_secs(60));
    limiter.set_cooldown("alice", "macro", Duration::from_secs(5));

    assert_eq!(limiter.check_cooldown("alice", "macro").remaining_seconds(), 5);
    assert!(limiter.clear_cooldown("alice", "macro"));
    assert!(!limiter.clear_cooldown("alice", "macro"));
    assert!(!limiter.check_cooldown("alice", "macro").is_on_cooldown());
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_cooldown_stays_active() {
    let limiter = limiter();
    limiter.set_cooldown("alice", "macro", Duration::MAX);

    let status = limiter.check_cooldown("alice", "macro");
    assert!(status.is_on_cooldown());
    assert!(status.remaining_seconds() > 365 * 24 * 60 * 60);

    advance(Duration::from_secs(24 * 60 * 60)).await;
    assert!(limiter.check_cooldown("alice", "macro").is_on_cooldown());
    assert_eq!(limiter.cleanup_expired_cooldowns(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_burst_allows_capacity_then_reports_retry_after() {
    let limiter = limiter();
    let policy = BurstPolicy::new(5, Duration::from_secs(60), 2);

    for i in 0..7 {
        let decision = limiter.check_burst_limit("alice", "search", &policy);
        assert_eq!(
            decision,
            BurstDecision::Allowed {
                current_usage: i + 1,
                remaining_requests: 6 - i,
            }
        );
        advance(Duration::from_secs(1)).await;
    }

    // t=7; the oldest counted event was at t=0.
    let decision = limiter.check_burst_limit("alice", "search", &policy);
    assert!(!decision.is_allowed());
    assert_eq!(decision.current_usage(), 7);
    assert_eq!(decision.retry_after(), Some(Duration::from_secs(53)));
    assert_eq!(decision.remaining_seconds(), Some(53));

    advance(Duration::from_secs(53)).await;
    assert!(limiter.check_burst_limit("alice", "search", &policy).is_allowed());
}

#[tokio::test(start_paused = true)]
async fn test_burst_default_policy_from_config() {
    let limiter = limiter();
    for _ in 0..7 {
        assert!(limiter.check_burst("dave", "search").is_allowed());
    }
    let decision = limiter.check_burst("dave", "search");
    assert_eq!(decision.retry_after(), Some(Duration::from_secs(60)));
    assert_eq!(decision.remaining_ms(), Some(60_000));
}

#[tokio::test(start_paused = true)]
async fn test_burst_zero_capacity_denies() {
    let limiter = limiter();
    let policy = BurstPolicy::new(0, Duration::from_secs(10), 0);

    let decision = limiter.check_burst_limit("alice", "search", &policy);
    assert_eq!(
        decision,
        BurstDecision::Denied {
            retry_after: Duration::from_secs(10),
            current_usage: 0,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_counts_expired_cooldowns() {
    let limiter = limiter();
    limiter.set_cooldown("alice", "macro", Duration::from_secs(10));
    limiter.set_cooldown("bob", "macro", Duration::from_secs(10));
    limiter.set_cooldown("carol", "macro", Duration::from_secs(100));

    assert_eq!(limiter.cleanup_expired_cooldowns(), 0);

    advance(Duration::from_secs(10)).await;
    let stats = limiter.stats();
    assert_eq!(*stats.expired_cooldowns(), 2);
    assert_eq!(*stats.active_cooldowns(), 1);
    assert!(*stats.cleanup_needed());

    assert_eq!(limiter.cleanup_expired_cooldowns(), 2);
    let stats = limiter.stats();
    assert_eq!(*stats.total_cooldown_entries(), 1);
    assert!(!*stats.cleanup_needed());
}

#[tokio::test(start_paused = true)]
async fn test_prune_idle_histories() {
    let limiter = limiter();
    limiter.check_rate_limit("alice", 5, Duration::from_secs(10));
    limiter.check_rate_limit("bob", 5, Duration::from_secs(100));
    limiter.check_burst_limit("alice", "search", &BurstPolicy::new(1, Duration::from_secs(10), 0));

    advance(Duration::from_secs(10)).await;
    assert_eq!(limiter.prune_idle_histories(), 2);

    let stats = limiter.stats();
    assert_eq!(*stats.actors_with_history(), 1);
    assert_eq!(*stats.burst_histories(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_matches_exact_actor() {
    let limiter = limiter();
    let window = Duration::from_secs(60);
    limiter.set_cooldown("ann", "macro", Duration::from_secs(60));
    limiter.set_cooldown("joanne", "macro", Duration::from_secs(60));
    assert!(limiter.check_rate_limit("ann", 1, window));
    assert!(limiter.check_rate_limit("joanne", 1, window));
    limiter.check_burst_limit("ann", "search", &BurstPolicy::default());

    limiter.reset_user_limits("ann");

    assert!(!limiter.check_cooldown("ann", "macro").is_on_cooldown());
    assert!(limiter.check_rate_limit("ann", 1, window));
    assert!(limiter.check_cooldown("joanne", "macro").is_on_cooldown());
    assert!(!limiter.check_rate_limit("joanne", 1, window));
    assert_eq!(*limiter.stats().burst_histories(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_background_cleanup_sweeps_on_interval() {
    let limiter = limiter();
    limiter.start_cleanup();
    limiter.start_cleanup();
    assert!(limiter.is_cleanup_running());

    limiter.set_cooldown("alice", "macro", Duration::from_secs(5));
    limiter.check_rate_limit("alice", 5, Duration::from_secs(5));

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(*limiter.stats().total_cooldown_entries(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let stats = limiter.stats();
    assert_eq!(*stats.total_cooldown_entries(), 0);
    assert_eq!(*stats.actors_with_history(), 0);

    limiter.stop_cleanup().await;
    assert!(!limiter.is_cleanup_running());
}

#[tokio::test(start_paused = true)]
async fn test_clones_share_state() {
    let limiter = limiter();
    let other = limiter.clone();
    limiter.set_cooldown("alice", "macro", Duration::from_secs(30));
    assert!(other.check_cooldown("alice", "macro").is_on_cooldown());
}
