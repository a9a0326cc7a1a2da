//! HTTP endpoint handlers for the server.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page with the endpoint list
//! - `/health`: Host health (503 when any resource is Critical)
//! - `/report`: Plain-text monitoring report
//! - `/stats`: JSON snapshot of latency, cache and limiter counters
//! - `/metrics`: Prometheus metrics endpoint
//!
//! Every route runs behind the [`admission`] middleware.

pub mod admission;
pub mod health;
pub mod metrics;
pub mod report;
pub mod root;
pub mod stats;

// Re-export handlers
pub use admission::admission;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use report::report_handler;
pub use root::root_handler;
pub use stats::stats_handler;
