//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns the
//! host health derived from the monitor's most recent samples.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use storefront_perf::{HealthLevel, HealthStatus, MonitorStats};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let health = state.monitor.get_health();
    let stats = state.monitor.stats();
    let status = http_status(&health);

    debug!("Health check: {} - {}", status, health.overall());
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        render_health(&health, &stats, state.monitor.is_running()),
    )
}

/// 503 when any resource is Critical, 200 otherwise.
pub fn http_status(health: &HealthStatus) -> StatusCode {
    if health.overall() == HealthLevel::Critical {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Renders health as a plain-text table.
pub fn render_health(health: &HealthStatus, stats: &MonitorStats, running: bool) -> String {
    let mut out = String::new();
    writeln!(out, "{}", health.overall()).ok();
    writeln!(out).ok();
    if !health.has_data() {
        writeln!(out, "No samples collected yet").ok();
        writeln!(out).ok();
    }

    writeln!(out, "HOST HEALTH").ok();
    writeln!(out, "===========").ok();
    writeln!(out).ok();
    writeln!(out, "{:10} | {:>10} | {:>10}", "Resource", "Average %", "Status").ok();
    writeln!(out, "{}", "-".repeat(36)).ok();
    for (name, level, average) in [
        ("CPU", health.cpu_health, health.average_cpu),
        ("Memory", health.memory_health, health.average_memory),
        ("Disk", health.disk_health, health.average_disk),
    ] {
        writeln!(out, "{:10} | {:>10.2} | {:>10}", name, average, level.as_str()).ok();
    }

    writeln!(out).ok();
    writeln!(out, "Samples in window:   {}", health.samples).ok();
    writeln!(out, "Samples in history:  {}", stats.samples).ok();
    writeln!(
        out,
        "Monitor:             {} ({} ticks, {} failed)",
        if running { "running" } else { "stopped" },
        stats.ticks,
        stats.failures
    )
    .ok();
    out
}
