//! Report endpoint handler.
//!
//! Serves the monitoring report through the response cache, so repeated
//! requests inside the configured TTL reuse the rendered text.

use axum::{extract::State, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

pub const REPORT_OPERATION: &str = "/report";

/// Handler for the /report endpoint.
#[instrument(skip(state))]
pub async fn report_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /report request");

    let body = state.cached_response(REPORT_OPERATION, "", "", || {
        state.monitor.generate_report()
    });

    ([("Content-Type", "text/plain; charset=utf-8")], body)
}
