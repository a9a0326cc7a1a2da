//! Ordered middleware chain wrapped around an externally supplied operation.
//!
//! Each [`Stage`] receives the request context and a [`Next`] continuation. It
//! may short-circuit (a rate-limit rejection, a cache hit) or delegate by
//! calling [`Next::run`]. The innermost call is the wrapped operation itself.
//!
//! The standard chain is rate limit, then latency measurement, then cache:
//! rejected requests never reach the cache or the operation, and cache hits
//! are still timed.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use storefront_perf::cache::TtlCache;
//! use storefront_perf::clock::system_clock;
//! use storefront_perf::interceptor::{CachePolicy, Interceptor, RequestContext};
//! use storefront_perf::latency::LatencyRecorder;
//! use storefront_perf::rate_limit::{RateLimitPolicy, SlidingWindowLimiter};
//!
//! let clock = system_clock();
//! let limiter = Arc::new(SlidingWindowLimiter::new(RateLimitPolicy::default(), clock.clone()));
//! let recorder = Arc::new(LatencyRecorder::new(1000, clock.clone()));
//! let cache = Arc::new(TtlCache::new(Duration::from_secs(300), clock.clone()));
//!
//! let pipeline: Interceptor<String, std::io::Error> = Interceptor::standard(
//!     limiter,
//!     recorder,
//!     Some((cache, CachePolicy::all(Duration::from_secs(60)))),
//! );
//!
//! let ctx = RequestContext::new("account_status", "10.0.0.7", "acct:7");
//! let status = pipeline.execute(&ctx, || Ok("active".to_string())).unwrap();
//! assert_eq!(status, "active");
//! ```

use crate::cache::TtlCache;
use crate::error::InterceptError;
use crate::latency::LatencyRecorder;
use crate::rate_limit::SlidingWindowLimiter;
use ahash::AHashMap as HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Identity of one unit of work flowing through the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub operation: String,
    pub client: String,
    /// Deterministic rendering of the operation's arguments.
    pub arguments_key: String,
}

impl RequestContext {
    pub fn new(
        operation: impl Into<String>,
        client: impl Into<String>,
        arguments_key: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            client: client.into(),
            arguments_key: arguments_key.into(),
        }
    }

    /// Key under which the result is cached: `operation:arguments`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.operation, self.arguments_key)
    }
}

pub type StageResult<T, E> = Result<T, InterceptError<E>>;

/// One link of the chain.
pub trait Stage<T, E>: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle(&self, ctx: &RequestContext, next: Next<'_, T, E>) -> StageResult<T, E>;
}

/// The remainder of the chain, including the wrapped operation.
pub struct Next<'a, T, E> {
    stages: &'a [Arc<dyn Stage<T, E>>],
    work: Box<dyn FnOnce() -> Result<T, E> + 'a>,
}

impl<'a, T, E> Next<'a, T, E> {
    /// Invokes the next stage, or the operation once the stages run out.
    pub fn run(self, ctx: &RequestContext) -> StageResult<T, E> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(
                ctx,
                Next {
                    stages: rest,
                    work: self.work,
                },
            ),
            None => (self.work)().map_err(InterceptError::Operation),
        }
    }
}

/// Rejects requests whose `(client, operation)` budget is exhausted.
pub struct RateLimitStage {
    limiter: Arc<SlidingWindowLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<SlidingWindowLimiter>) -> Self {
        Self { limiter }
    }
}

impl<T, E> Stage<T, E> for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn handle(&self, ctx: &RequestContext, next: Next<'_, T, E>) -> StageResult<T, E> {
        self.limiter.check(&ctx.client, &ctx.operation)?;
        next.run(ctx)
    }
}

/// Times everything downstream, on success and on failure.
pub struct MeasureStage {
    recorder: Arc<LatencyRecorder>,
}

impl MeasureStage {
    pub fn new(recorder: Arc<LatencyRecorder>) -> Self {
        Self { recorder }
    }
}

impl<T, E: std::fmt::Display> Stage<T, E> for MeasureStage {
    fn name(&self) -> &'static str {
        "measure"
    }

    fn handle(&self, ctx: &RequestContext, next: Next<'_, T, E>) -> StageResult<T, E> {
        let timer = self.recorder.start_timer(&ctx.operation);
        let result = next.run(ctx);
        let elapsed = timer.finish();

        if let Err(InterceptError::Operation(e)) = &result {
            warn!(
                "Error in {}: {} (took {:.4}s)",
                ctx.operation,
                e,
                elapsed.as_secs_f64()
            );
        }
        result
    }
}

/// Which operations are cached, and for how long.
#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    /// TTL for operations without their own entry; `None` disables caching
    /// for them.
    pub default_ttl: Option<Duration>,
    pub operations: HashMap<String, Duration>,
}

impl CachePolicy {
    /// Caches every operation for `ttl`.
    pub fn all(ttl: Duration) -> Self {
        Self {
            default_ttl: Some(ttl),
            operations: HashMap::new(),
        }
    }

    /// Caches only the listed operations.
    pub fn only<I, S>(operations: I) -> Self
    where
        I: IntoIterator<Item = (S, Duration)>,
        S: Into<String>,
    {
        Self {
            default_ttl: None,
            operations: operations
                .into_iter()
                .map(|(op, ttl)| (op.into(), ttl))
                .collect(),
        }
    }

    pub fn ttl_for(&self, operation: &str) -> Option<Duration> {
        self.operations.get(operation).copied().or(self.default_ttl)
    }
}

/// Serves repeated calls from the result cache.
pub struct CacheStage<T> {
    cache: Arc<TtlCache<T>>,
    policy: CachePolicy,
}

impl<T> CacheStage<T> {
    pub fn new(cache: Arc<TtlCache<T>>, policy: CachePolicy) -> Self {
        Self { cache, policy }
    }
}

impl<T, E> Stage<T, E> for CacheStage<T>
where
    T: Clone + Send + Sync,
{
    fn name(&self) -> &'static str {
        "cache"
    }

    fn handle(&self, ctx: &RequestContext, next: Next<'_, T, E>) -> StageResult<T, E> {
        let Some(ttl) = self.policy.ttl_for(&ctx.operation) else {
            return next.run(ctx);
        };

        let key = ctx.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            debug!(key = %key, "Cache hit");
            return Ok(hit);
        }

        let value = next.run(ctx)?;
        self.cache.set(key, value.clone(), ttl);
        Ok(value)
    }
}

/// An ordered list of stages wrapped around operations.
pub struct Interceptor<T, E> {
    stages: Vec<Arc<dyn Stage<T, E>>>,
}

impl<T, E> Default for Interceptor<T, E> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<T, E> Interceptor<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage; stages run in the order they were added.
    pub fn with_stage(mut self, stage: impl Stage<T, E> + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Names of the stages in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs `work` through every stage.
    pub fn execute<'a, F>(&'a self, ctx: &RequestContext, work: F) -> StageResult<T, E>
    where
        F: FnOnce() -> Result<T, E> + 'a,
    {
        Next {
            stages: &self.stages,
            work: Box::new(work),
        }
        .run(ctx)
    }

    /// Positional form of [`Interceptor::execute`].
    pub fn call<'a, F>(
        &'a self,
        operation: &str,
        client: &str,
        arguments_key: &str,
        work: F,
    ) -> StageResult<T, E>
    where
        F: FnOnce() -> Result<T, E> + 'a,
    {
        self.execute(&RequestContext::new(operation, client, arguments_key), work)
    }
}

impl<T, E> Interceptor<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: std::fmt::Display + 'static,
{
    /// Rate limit, then measure, then (optionally) cache.
    pub fn standard(
        limiter: Arc<SlidingWindowLimiter>,
        recorder: Arc<LatencyRecorder>,
        cache: Option<(Arc<TtlCache<T>>, CachePolicy)>,
    ) -> Self {
        let mut chain = Self::new()
            .with_stage(RateLimitStage::new(limiter))
            .with_stage(MeasureStage::new(recorder));
        if let Some((cache, policy)) = cache {
            chain = chain.with_stage(CacheStage::new(cache, policy));
        }
        chain
    }
}
