//! Application state management for the server.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers, the admission middleware and the background workers.

use prometheus::Registry;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use storefront_perf::interceptor::CacheStage;
use storefront_perf::{
    Clock, HealthMonitor, Housekeeper, Interceptor, LatencyRecorder, ProcMetricsSource,
    SlidingWindowLimiter, TtlCache,
};
use tracing::debug;

use crate::config::Config;
use crate::metrics::PerfMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: PerfMetrics,
    pub config: Arc<Config>,
    /// Rendered responses of cacheable operations.
    pub cache: Arc<TtlCache<String>>,
    /// `None` when rate limiting is disabled.
    pub limiter: Option<Arc<SlidingWindowLimiter>>,
    pub recorder: Arc<LatencyRecorder>,
    pub monitor: Arc<HealthMonitor>,
    /// Cache stage wrapped around response rendering.
    pub responses: Interceptor<String, Infallible>,
    pub housekeeper: Housekeeper<String>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Builds every component from the effective configuration.
    pub fn build(
        config: Config,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();
        let metrics = PerfMetrics::new(&registry)?;
        debug!("Prometheus registry initialized");

        let cache = Arc::new(TtlCache::new(config.default_ttl(), clock.clone()));
        let limiter = config
            .enable_rate_limit
            .unwrap_or(true)
            .then(|| {
                Arc::new(SlidingWindowLimiter::new(
                    config.rate_limit_policy(),
                    clock.clone(),
                ))
            });
        let recorder = Arc::new(LatencyRecorder::new(
            config
                .latency_max_samples
                .unwrap_or(storefront_perf::latency::DEFAULT_MAX_SAMPLES),
            clock,
        ));

        let source = ProcMetricsSource::new(config.cpu_sample());
        let monitor = Arc::new(HealthMonitor::new(
            config.monitor_config(),
            Box::new(source),
        ));

        let mut responses = Interceptor::new();
        if config.enable_cache.unwrap_or(true) {
            responses = responses.with_stage(CacheStage::new(cache.clone(), config.cache_policy()));
        }

        let housekeeper = Housekeeper::new(Some(cache.clone()), limiter.clone());

        Ok(Self {
            registry,
            metrics,
            config: Arc::new(config),
            cache,
            limiter,
            recorder,
            monitor,
            responses,
            housekeeper,
            start_time: Instant::now(),
        })
    }

    /// Renders a response through the cache stage.
    pub fn cached_response(
        &self,
        operation: &str,
        client: &str,
        arguments_key: &str,
        render: impl FnOnce() -> String,
    ) -> String {
        match self
            .responses
            .call(operation, client, arguments_key, || Ok(render()))
        {
            Ok(body) => body,
            Err(e) => match e.into_operation() {
                Some(never) => match never {},
                // The response chain holds no rate-limit stage.
                None => String::new(),
            },
        }
    }
}
