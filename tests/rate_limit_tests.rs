//! Integration tests for the sliding-window rate limiter.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use storefront_perf::{ManualClock, RateLimitPolicy, SlidingWindowLimiter};

fn limiter(max_requests: usize, window_secs: u64) -> (SlidingWindowLimiter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let limiter = SlidingWindowLimiter::new(
        RateLimitPolicy::new(max_requests, Duration::from_secs(window_secs)),
        clock.clone(),
    );
    (limiter, clock)
}

#[test]
fn test_three_per_ten_seconds_scenario() {
    let (limiter, clock) = limiter(3, 10);

    let results: Vec<bool> = (0..4)
        .map(|t| limiter.allow_at("u1", "opX", clock.at_secs(t)))
        .collect();
    assert_eq!(results, vec![true, true, true, false]);

    assert!(limiter.allow_at("u1", "opX", clock.at_secs(11)));
}

#[test]
fn test_denial_does_not_extend_window() {
    let (limiter, clock) = limiter(2, 10);

    assert!(limiter.allow_at("u1", "op", clock.at_secs(0)));
    assert!(limiter.allow_at("u1", "op", clock.at_secs(1)));
    for t in 2..10 {
        assert!(!limiter.allow_at("u1", "op", clock.at_secs(t)));
    }
    // Denied calls were never recorded, so the first slot frees at t=10.
    assert!(limiter.allow_at("u1", "op", clock.at_secs(10)));
    assert_eq!(limiter.current_count("u1", "op", clock.at_secs(10)), 2);
}

#[test]
fn test_keys_are_independent() {
    let (limiter, clock) = limiter(1, 60);
    let now = clock.at_secs(0);

    assert!(limiter.allow_at("clientA", "op", now));
    assert!(!limiter.allow_at("clientA", "op", now));

    assert!(limiter.allow_at("clientB", "op", now));
    assert!(limiter.allow_at("clientA", "op2", now));
}

#[test]
fn test_retry_after_counts_down_from_oldest() {
    let (limiter, clock) = limiter(2, 10);

    limiter.check_at("u1", "op", clock.at_secs(2)).unwrap();
    limiter.check_at("u1", "op", clock.at_secs(5)).unwrap();

    let denied = limiter.check_at("u1", "op", clock.at_secs(7)).unwrap_err();
    assert_eq!(denied.retry_after, Duration::from_secs(5));
    assert_eq!(denied.client, "u1");
    assert_eq!(denied.operation, "op");
}

#[test]
fn test_operation_override_policy() {
    let clock = Arc::new(ManualClock::new());
    let limiter = SlidingWindowLimiter::new(RateLimitPolicy::default(), clock.clone())
        .with_operation_policy("purchase", RateLimitPolicy::new(1, Duration::from_secs(30)));

    assert!(limiter.allow("u1", "purchase"));
    assert!(!limiter.allow("u1", "purchase"));
    for _ in 0..50 {
        assert!(limiter.allow("u1", "browse"));
    }
}

#[test]
fn test_reaper_bounds_idle_keys() {
    let (limiter, clock) = limiter(5, 10);

    for i in 0..100 {
        limiter.allow(&format!("client-{i}"), "op");
    }
    assert_eq!(limiter.tracked_keys(), 100);

    clock.advance(Duration::from_secs(5));
    limiter.allow("active", "op");
    assert_eq!(limiter.reap(), 0);

    clock.advance(Duration::from_secs(6));
    assert_eq!(limiter.reap(), 100);
    assert_eq!(limiter.tracked_keys(), 1);
}

#[test]
fn test_concurrent_callers_never_exceed_budget() {
    let (limiter, _) = limiter(50, 60);
    let limiter = Arc::new(limiter);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = limiter.clone();
            thread::spawn(move || (0..20).filter(|_| limiter.allow("shared", "op")).count())
        })
        .collect();

    let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(admitted, 50);

    let stats = limiter.stats();
    assert_eq!(stats.allowed, 50);
    assert_eq!(stats.denied, 8 * 20 - 50);
}
