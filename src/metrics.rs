//! Prometheus metrics definitions for storefront-perf.
//!
//! Request-path metrics (latency histogram, rejections) are updated live by the
//! admission middleware. Component snapshots (cache, limiter, health) are
//! copied into gauges on every `/metrics` scrape by
//! [`PerfMetrics::refresh_cache`], [`PerfMetrics::refresh_limiter`] and
//! [`PerfMetrics::refresh_health`].

use prometheus::{
    GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use storefront_perf::{CacheStats, HealthStatus, LimiterStats, MonitorStats};

/// Latency buckets in seconds, from 1ms to 10s.
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Collection of all exported metrics.
#[derive(Clone)]
pub struct PerfMetrics {
    // ========== Request Path ==========
    pub request_duration_seconds: HistogramVec, // labels: operation
    pub requests_rejected_total: IntCounterVec, // labels: operation

    // ========== Result Cache ==========
    pub cache_entries: IntGauge,
    pub cache_lookups: IntGaugeVec, // labels: result (hit/miss)

    // ========== Rate Limiter ==========
    pub rate_limit_tracked_keys: IntGauge,
    pub rate_limit_decisions: IntGaugeVec, // labels: decision (allowed/denied)

    // ========== Host Health ==========
    pub health_average_percent: GaugeVec, // labels: resource
    pub health_level: IntGaugeVec,        // labels: resource
    pub health_samples: IntGauge,
    pub monitor_ticks: IntGaugeVec, // labels: outcome (total/failed)
}

impl PerfMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "storefront_perf_request_duration_seconds",
                "Time spent handling a request, per operation",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["operation"],
        )?;
        let requests_rejected_total = IntCounterVec::new(
            Opts::new(
                "storefront_perf_requests_rejected_total",
                "Requests rejected by the rate limiter, per operation",
            ),
            &["operation"],
        )?;

        let cache_entries = IntGauge::new(
            "storefront_perf_cache_entries",
            "Entries currently stored in the result cache",
        )?;
        let cache_lookups = IntGaugeVec::new(
            Opts::new(
                "storefront_perf_cache_lookups",
                "Result cache lookups since start, by result",
            ),
            &["result"],
        )?;

        let rate_limit_tracked_keys = IntGauge::new(
            "storefront_perf_rate_limit_tracked_keys",
            "Client/operation pairs currently holding a rate-limit window",
        )?;
        let rate_limit_decisions = IntGaugeVec::new(
            Opts::new(
                "storefront_perf_rate_limit_decisions",
                "Rate-limit decisions since start, by decision",
            ),
            &["decision"],
        )?;

        let health_average_percent = GaugeVec::new(
            Opts::new(
                "storefront_perf_health_average_percent",
                "Average host usage over the health window, per resource",
            ),
            &["resource"],
        )?;
        let health_level = IntGaugeVec::new(
            Opts::new(
                "storefront_perf_health_level",
                "Health level per resource (0 = good, 1 = warning, 2 = critical)",
            ),
            &["resource"],
        )?;
        let health_samples = IntGauge::new(
            "storefront_perf_health_samples",
            "Samples currently held in the monitor history",
        )?;
        let monitor_ticks = IntGaugeVec::new(
            Opts::new(
                "storefront_perf_monitor_ticks",
                "Health monitor ticks since start, by outcome",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(requests_rejected_total.clone()))?;
        registry.register(Box::new(cache_entries.clone()))?;
        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(rate_limit_tracked_keys.clone()))?;
        registry.register(Box::new(rate_limit_decisions.clone()))?;
        registry.register(Box::new(health_average_percent.clone()))?;
        registry.register(Box::new(health_level.clone()))?;
        registry.register(Box::new(health_samples.clone()))?;
        registry.register(Box::new(monitor_ticks.clone()))?;

        Ok(Self {
            request_duration_seconds,
            requests_rejected_total,
            cache_entries,
            cache_lookups,
            rate_limit_tracked_keys,
            rate_limit_decisions,
            health_average_percent,
            health_level,
            health_samples,
            monitor_ticks,
        })
    }

    pub fn refresh_cache(&self, stats: &CacheStats) {
        self.cache_entries.set(stats.entries as i64);
        self.cache_lookups
            .with_label_values(&["hit"])
            .set(stats.hits as i64);
        self.cache_lookups
            .with_label_values(&["miss"])
            .set(stats.misses as i64);
    }

    pub fn refresh_limiter(&self, stats: &LimiterStats) {
        self.rate_limit_tracked_keys.set(stats.tracked_keys as i64);
        self.rate_limit_decisions
            .with_label_values(&["allowed"])
            .set(stats.allowed as i64);
        self.rate_limit_decisions
            .with_label_values(&["denied"])
            .set(stats.denied as i64);
    }

    pub fn refresh_health(&self, health: &HealthStatus, monitor: &MonitorStats) {
        for (resource, level, average) in [
            ("cpu", health.cpu_health, health.average_cpu),
            ("memory", health.memory_health, health.average_memory),
            ("disk", health.disk_health, health.average_disk),
        ] {
            self.health_average_percent
                .with_label_values(&[resource])
                .set(average);
            self.health_level
                .with_label_values(&[resource])
                .set(level.severity() as i64);
        }
        self.health_samples.set(monitor.samples as i64);
        self.monitor_ticks
            .with_label_values(&["total"])
            .set(monitor.ticks as i64);
        self.monitor_ticks
            .with_label_values(&["failed"])
            .set(monitor.failures as i64);
    }
}
