//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with all available endpoints and descriptions.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");
    let uptime_str = format_uptime(state.start_time.elapsed().as_secs());
    let policy = state.config.rate_limit_policy();
    let rate_limit = if state.limiter.is_some() {
        format!(
            "{} requests / {}s",
            policy.max_requests,
            policy.window.as_secs()
        )
    } else {
        "disabled".to_string()
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Storefront Performance</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
        }}
        h1 {{ color: #333; border-bottom: 3px solid #2f855a; padding-bottom: 15px; }}
        .info {{ background: #e9ecef; padding: 15px; border-radius: 4px; display: flex; gap: 40px; }}
        .info-label {{ font-weight: 600; color: #555; display: block; font-size: 0.9em; }}
        .endpoint-list {{ list-style: none; padding: 0; }}
        .endpoint-list li {{ margin: 16px 0; padding: 12px; background: #f8f9fa; border-left: 4px solid #2f855a; }}
        .endpoint-list a {{ color: #2f855a; font-weight: 600; text-decoration: none; }}
        .endpoint-desc {{ color: #666; margin-top: 5px; }}
    </style>
</head>
<body>
<div class="container">
    <h1>Storefront Performance</h1>

    <div class="info">
        <div><span class="info-label">Version</span>{version}</div>
        <div><span class="info-label">Uptime</span>{uptime}</div>
        <div><span class="info-label">Rate limit</span>{rate_limit}</div>
    </div>

    <h2>Available Endpoints</h2>
    <ul class="endpoint-list">
        <li>
            <a href="/health">/health</a>
            <div class="endpoint-desc">CPU, memory and disk health over the recent samples (text)</div>
        </li>
        <li>
            <a href="/report">/report</a>
            <div class="endpoint-desc">Monitoring report with peak usage</div>
        </li>
        <li>
            <a href="/stats">/stats</a>
            <div class="endpoint-desc">Latency, cache and rate-limit counters (JSON)</div>
        </li>
        <li>
            <a href="/metrics">/metrics</a>
            <div class="endpoint-desc">Prometheus-compatible metrics endpoint</div>
        </li>
    </ul>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        rate_limit = rate_limit,
    );

    Html(html)
}

/// Formats seconds as `Xh Ym Zs`.
pub fn format_uptime(uptime_secs: u64) -> String {
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    format!("{}h {}m {}s", hours, minutes, seconds)
}
