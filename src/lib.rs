//! Storefront Performance Control Plane
//!
//! This library provides the in-process performance layer of a storefront
//! backend: a TTL result cache, a sliding-window rate limiter, per-operation
//! latency recording and a background host health monitor, plus an
//! interceptor chain that composes them around arbitrary operations. It is
//! framework-agnostic; the `storefront-perf` binary wires it into an HTTP
//! server.
//!
//! # Features
//!
//! - **Result Cache**: Keyed values with per-entry expiry and lazy eviction
//! - **Rate Limiting**: Sliding-window admission per `(client, operation)`
//! - **Latency Recording**: Bounded per-operation windows with average and max
//! - **Health Monitoring**: Periodic CPU, memory and disk sampling with
//!   Good / Warning / Critical classification and a persisted history log
//! - **Injectable Clock**: Every time-dependent component reads a [`Clock`]
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use storefront_perf::{system_clock, RateLimitPolicy, SlidingWindowLimiter, TtlCache};
//!
//! let clock = system_clock();
//!
//! let cache = TtlCache::new(Duration::from_secs(300), clock.clone());
//! cache.set("plans:all", vec!["basic", "pro"], Duration::from_secs(60));
//! assert_eq!(cache.get("plans:all"), Some(vec!["basic", "pro"]));
//!
//! let limiter = SlidingWindowLimiter::new(RateLimitPolicy::default(), clock);
//! assert!(limiter.allow("10.0.0.7", "/checkout"));
//! ```

pub mod cache;
pub mod clock;
pub mod error;
pub mod health;
pub mod health_config;
pub mod history;
pub mod housekeeping;
pub mod interceptor;
pub mod latency;
pub mod rate_limit;
pub mod ringbuffer;
pub mod sampler;
pub mod worker;

// Re-export main types for convenience
pub use cache::{CacheStats, TtlCache};
pub use clock::{system_clock, Clock, ManualClock, SystemClock};
pub use error::{HistoryError, InterceptError, MonitorError, RateLimitExceeded, SampleError};
pub use health::{HealthLevel, HealthMonitor, HealthStatus, MonitorStats};
pub use health_config::{HealthThresholds, MonitorConfig};
pub use history::HistoryLog;
pub use housekeeping::{Housekeeper, SweepReport};
pub use interceptor::{CachePolicy, Interceptor, RequestContext, Stage};
pub use latency::{LatencyRecorder, LatencyStats, LatencyTimer};
pub use rate_limit::{LimiterStats, RateLimitPolicy, SlidingWindowLimiter};
pub use sampler::{MetricSample, MetricsSource, ProcMetricsSource, SystemMetrics};
