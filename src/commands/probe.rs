//! Probe command implementation.
//!
//! Sends a burst of requests through the standard interceptor chain (rate
//! limit, measure, cache) and prints how each one was handled.

use std::sync::Arc;
use std::time::Duration;
use storefront_perf::{
    system_clock, CachePolicy, InterceptError, Interceptor, LatencyRecorder, RequestContext,
    SlidingWindowLimiter, TtlCache,
};

use crate::config::Config;

/// Outcome of one probe request.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Served(String),
    Rejected { retry_after_secs: u64 },
    Failed(String),
}

/// Runs the probe and prints a summary.
pub fn command_probe(
    client: &str,
    operation: &str,
    arguments: &str,
    requests: usize,
    cache_ttl: u64,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔬 Storefront Performance - Probe");
    println!("=================================");

    let policy = config.rate_limit_policy();
    println!(
        "   Client: {}  Operation: {}  Limit: {} / {}s",
        client,
        operation,
        policy.max_requests,
        policy.window.as_secs()
    );

    let clock = system_clock();
    let limiter = Arc::new(SlidingWindowLimiter::new(policy, clock.clone()));
    let recorder = Arc::new(LatencyRecorder::new(
        config
            .latency_max_samples
            .unwrap_or(storefront_perf::latency::DEFAULT_MAX_SAMPLES),
        clock.clone(),
    ));
    let cache = Arc::new(TtlCache::new(config.default_ttl(), clock));

    let cache_stage = (cache_ttl > 0).then(|| {
        (
            cache.clone(),
            CachePolicy::only([(operation, Duration::from_secs(cache_ttl))]),
        )
    });
    let pipeline = Interceptor::standard(limiter, recorder.clone(), cache_stage);

    let ctx = RequestContext::new(operation, client, arguments);
    for (n, outcome) in run_probe(&pipeline, &ctx, requests).iter().enumerate() {
        match outcome {
            ProbeOutcome::Served(value) => println!("   ├─ #{} ✅ {}", n + 1, value),
            ProbeOutcome::Rejected { retry_after_secs } => println!(
                "   ├─ #{} ⛔ 429 Too Many Requests (retry after {}s)",
                n + 1,
                retry_after_secs
            ),
            ProbeOutcome::Failed(e) => println!("   ├─ #{} ❌ {}", n + 1, e),
        }
    }

    let latency = recorder.stats(operation);
    let cache_stats = cache.stats();
    println!();
    println!(
        "   📈 Latency: {} measured, avg {:.3}ms, max {:.3}ms",
        latency.count, latency.average_ms, latency.max_ms
    );
    println!(
        "   🗄️  Cache: {} entries, {} hits, {} misses",
        cache_stats.entries, cache_stats.hits, cache_stats.misses
    );
    Ok(())
}

/// Sends `requests` calls through `pipeline`. The wrapped operation reports
/// which call actually executed it, which makes cache hits visible.
pub fn run_probe(
    pipeline: &Interceptor<String, String>,
    ctx: &RequestContext,
    requests: usize,
) -> Vec<ProbeOutcome> {
    (1..=requests)
        .map(|n| {
            let result = pipeline.execute(ctx, || {
                Ok(format!(
                    "{}({}) handled by request #{}",
                    ctx.operation, ctx.arguments_key, n
                ))
            });
            match result {
                Ok(value) => ProbeOutcome::Served(value),
                Err(InterceptError::RateLimited(denied)) => ProbeOutcome::Rejected {
                    retry_after_secs: denied.retry_after_secs(),
                },
                Err(InterceptError::Operation(e)) => ProbeOutcome::Failed(e),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_perf::{ManualClock, RateLimitPolicy};

    #[test]
    fn test_probe_rejects_after_limit_and_serves_from_cache() {
        let clock = Arc::new(ManualClock::new());
        let limiter = Arc::new(SlidingWindowLimiter::new(
            RateLimitPolicy::new(3, Duration::from_secs(10)),
            clock.clone(),
        ));
        let recorder = Arc::new(LatencyRecorder::new(10, clock.clone()));
        let cache = Arc::new(TtlCache::new(Duration::from_secs(300), clock.clone()));
        let pipeline = Interceptor::standard(
            limiter,
            recorder,
            Some((cache, CachePolicy::only([("opX", Duration::from_secs(60))]))),
        );

        let ctx = RequestContext::new("opX", "u1", "a=1");
        let outcomes = run_probe(&pipeline, &ctx, 4);
        let first = ProbeOutcome::Served("opX(a=1) handled by request #1".to_string());
        assert_eq!(outcomes[0], first);
        assert_eq!(outcomes[1], first);
        assert_eq!(outcomes[2], first);
        assert_eq!(
            outcomes[3],
            ProbeOutcome::Rejected {
                retry_after_secs: 10
            }
        );
    }
}
