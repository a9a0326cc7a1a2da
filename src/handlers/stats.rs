//! Stats endpoint handler.
//!
//! Returns a JSON snapshot of every request-path component.

use axum::{extract::State, Json};
use serde::Serialize;
use storefront_perf::{CacheStats, LatencyStats, LimiterStats, MonitorStats};
use tracing::{debug, instrument};

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct OperationStats {
    pub operation: String,
    #[serde(flatten)]
    pub latency: LatencyStats,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub operations: Vec<OperationStats>,
    pub cache: CacheStats,
    pub cache_keys: Vec<String>,
    /// `None` when rate limiting is disabled.
    pub rate_limit: Option<LimiterStats>,
    pub monitor: MonitorStats,
}

/// Handler for the /stats endpoint.
#[instrument(skip(state))]
pub async fn stats_handler(State(state): State<SharedState>) -> Json<StatsResponse> {
    debug!("Processing /stats request");

    let operations = state
        .recorder
        .snapshot()
        .into_iter()
        .map(|(operation, latency)| OperationStats { operation, latency })
        .collect();

    let mut cache_keys = state.cache.keys();
    cache_keys.sort();

    Json(StatsResponse {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        operations,
        cache: state.cache.stats(),
        cache_keys,
        rate_limit: state.limiter.as_ref().map(|l| l.stats()),
        monitor: state.monitor.stats(),
    })
}
