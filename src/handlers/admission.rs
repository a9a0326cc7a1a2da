//! Admission middleware applied to every route.
//!
//! The client is identified by its peer IP and the operation by the matched
//! route path. Denied requests are answered with `429 Too Many Requests`
//! before the handler runs; admitted requests are timed end to end with the
//! same limiter check and latency timer the library interceptor stages use.

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use storefront_perf::RateLimitExceeded;
use tracing::debug;

use crate::state::SharedState;

/// Identity used when the peer address is not known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Rate-limits, then times, the wrapped handler.
pub async fn admission(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let client = client_identity(&request);
    let operation = operation_name(&request);

    if let Some(limiter) = &state.limiter {
        if let Err(denied) = limiter.check(&client, &operation) {
            state
                .metrics
                .requests_rejected_total
                .with_label_values(&[operation.as_str()])
                .inc();
            return rejection_response(&denied);
        }
    }

    let timer = state.recorder.start_timer(&operation);
    let response = next.run(request).await;
    let elapsed = timer.finish();

    state
        .metrics
        .request_duration_seconds
        .with_label_values(&[operation.as_str()])
        .observe(elapsed.as_secs_f64());
    debug!(
        client = %client,
        operation = %operation,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "Request completed"
    );

    response
}

/// Peer IP of the connection, or [`UNKNOWN_CLIENT`].
pub fn client_identity(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Matched route template, falling back to the raw path.
pub fn operation_name(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

/// 429 response carrying `Retry-After` and a JSON body.
pub fn rejection_response(denied: &RateLimitExceeded) -> Response {
    let retry_after = denied.retry_after_secs();
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.to_string())],
        Json(json!({
            "error": "Rate limit exceeded",
            "operation": denied.operation,
            "retry_after": retry_after,
        })),
    )
        .into_response()
}
