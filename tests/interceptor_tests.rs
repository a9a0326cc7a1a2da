//! Integration tests for the interceptor chain.
//!
//! These tests compose the real components the way a request pipeline does
//! and check ordering guarantees between the stages.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;
use storefront_perf::interceptor::{Next, StageResult};
use storefront_perf::{
    CachePolicy, InterceptError, Interceptor, LatencyRecorder, ManualClock, RateLimitPolicy,
    RequestContext, SlidingWindowLimiter, Stage, TtlCache,
};

struct Pipeline {
    clock: Arc<ManualClock>,
    limiter: Arc<SlidingWindowLimiter>,
    recorder: Arc<LatencyRecorder>,
    cache: Arc<TtlCache<String>>,
    chain: Interceptor<String, String>,
}

fn pipeline(max_requests: usize, window_secs: u64, policy: CachePolicy) -> Pipeline {
    let clock = Arc::new(ManualClock::new());
    let limiter = Arc::new(SlidingWindowLimiter::new(
        RateLimitPolicy::new(max_requests, Duration::from_secs(window_secs)),
        clock.clone(),
    ));
    let recorder = Arc::new(LatencyRecorder::new(1000, clock.clone()));
    let cache = Arc::new(TtlCache::new(Duration::from_secs(300), clock.clone()));
    let chain = Interceptor::standard(
        limiter.clone(),
        recorder.clone(),
        Some((cache.clone(), policy)),
    );
    Pipeline {
        clock,
        limiter,
        recorder,
        cache,
        chain,
    }
}

#[test]
fn test_rate_limit_scenario_through_chain() {
    let p = pipeline(3, 10, CachePolicy::default());
    let ctx = RequestContext::new("opX", "u1", "");
    let calls = Cell::new(0);

    let mut outcomes = Vec::new();
    for t in 0..4 {
        p.clock.set_offset(Duration::from_secs(t));
        let result = p.chain.execute(&ctx, || {
            calls.set(calls.get() + 1);
            Ok("done".to_string())
        });
        outcomes.push(result.is_ok());
    }
    assert_eq!(outcomes, vec![true, true, true, false]);
    assert_eq!(calls.get(), 3);

    p.clock.set_offset(Duration::from_secs(11));
    assert!(p.chain.execute(&ctx, || Ok("done".to_string())).is_ok());
}

#[test]
fn test_rejection_carries_retry_after() {
    let p = pipeline(1, 60, CachePolicy::default());
    let ctx = RequestContext::new("purchase", "10.0.0.7", "plan:3");

    p.chain.execute(&ctx, || Ok("ok".to_string())).unwrap();
    p.clock.advance(Duration::from_secs(15));

    match p.chain.execute(&ctx, || Ok("ok".to_string())) {
        Err(InterceptError::RateLimited(denied)) => {
            assert_eq!(denied.retry_after, Duration::from_secs(45));
            assert_eq!(denied.retry_after_secs(), 45);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn test_denied_request_does_not_probe_cache() {
    let p = pipeline(1, 60, CachePolicy::all(Duration::from_secs(30)));
    let ctx = RequestContext::new("account_status", "u1", "acct:7");

    p.chain.execute(&ctx, || Ok("active".to_string())).unwrap();
    let before = p.cache.stats();

    assert!(p
        .chain
        .execute(&ctx, || Ok("active".to_string()))
        .unwrap_err()
        .is_rate_limited());
    assert_eq!(p.cache.stats(), before);
    assert_eq!(p.limiter.stats().denied, 1);
}

#[test]
fn test_cached_result_expires_with_ttl() {
    let p = pipeline(
        100,
        60,
        CachePolicy::only([("account_status", Duration::from_secs(5))]),
    );
    let ctx = RequestContext::new("account_status", "u1", "acct:7");
    let version = Cell::new(0);
    let load = || {
        version.set(version.get() + 1);
        Ok(format!("status-v{}", version.get()))
    };

    assert_eq!(p.chain.execute(&ctx, load).unwrap(), "status-v1");
    p.clock.set_offset(Duration::from_secs(4));
    assert_eq!(p.chain.execute(&ctx, load).unwrap(), "status-v1");
    p.clock.set_offset(Duration::from_secs(6));
    assert_eq!(p.chain.execute(&ctx, load).unwrap(), "status-v2");
}

#[test]
fn test_cache_keys_include_arguments() {
    let p = pipeline(100, 60, CachePolicy::all(Duration::from_secs(60)));

    for acct in ["acct:1", "acct:2", "acct:1"] {
        let ctx = RequestContext::new("account_status", "u1", acct);
        p.chain
            .execute(&ctx, || Ok(format!("status of {acct}")))
            .unwrap();
    }

    let mut keys = p.cache.keys();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "account_status:acct:1".to_string(),
            "account_status:acct:2".to_string()
        ]
    );
    let stats = p.cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
}

#[test]
fn test_operation_error_passes_through_after_timing() {
    let p = pipeline(100, 60, CachePolicy::all(Duration::from_secs(60)));
    let ctx = RequestContext::new("purchase", "u1", "plan:9");

    let err = p
        .chain
        .execute(&ctx, || {
            p.clock.advance(Duration::from_millis(75));
            Err("card declined".to_string())
        })
        .unwrap_err();

    assert_eq!(err.into_operation(), Some("card declined".to_string()));
    let stats = p.recorder.stats("purchase");
    assert_eq!(stats.count, 1);
    assert!((stats.max_ms - 75.0).abs() < 1e-6);
    assert!(p.cache.is_empty());
}

/// Stage that tags results, used to check custom stages compose in order.
struct Tag(&'static str);

impl Stage<String, String> for Tag {
    fn name(&self) -> &'static str {
        self.0
    }

    fn handle(
        &self,
        ctx: &RequestContext,
        next: Next<'_, String, String>,
    ) -> StageResult<String, String> {
        next.run(ctx).map(|v| format!("{}({})", self.0, v))
    }
}

#[test]
fn test_custom_stages_wrap_in_order() {
    let chain: Interceptor<String, String> =
        Interceptor::new().with_stage(Tag("outer")).with_stage(Tag("inner"));
    let ctx = RequestContext::new("op", "c", "");

    assert_eq!(chain.stage_names(), vec!["outer", "inner"]);
    assert_eq!(
        chain.execute(&ctx, || Ok("x".to_string())).unwrap(),
        "outer(inner(x))"
    );
}

#[test]
fn test_empty_chain_runs_operation() {
    let chain: Interceptor<u32, String> = Interceptor::new();
    let result = chain.call("op", "c", "", || Ok(7));
    assert_eq!(result.unwrap(), 7);
}
