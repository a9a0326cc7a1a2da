//! Error types surfaced by the control plane.
//!
//! Cache misses are not errors and never appear here. Monitor failures are
//! caught inside the monitor loop and only reach callers of the explicit
//! sampling API.

use std::time::Duration;

/// Rejection produced when a `(client, operation)` pair has used up its
/// budget for the current window.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("too many requests from '{client}' for '{operation}', retry after {}s", .retry_after.as_secs_f64().ceil())]
pub struct RateLimitExceeded {
    pub client: String,
    pub operation: String,
    /// Time until the oldest request in the window ages out.
    pub retry_after: Duration,
}

impl RateLimitExceeded {
    /// Retry-after rounded up to whole seconds, as used in HTTP headers.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

/// Failure of a single pass through the interceptor pipeline.
#[derive(Debug, thiserror::Error)]
pub enum InterceptError<E> {
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    /// The wrapped operation failed; the error is passed through untouched.
    #[error("operation failed: {0}")]
    Operation(E),
}

impl<E> InterceptError<E> {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, InterceptError::RateLimited(_))
    }

    /// Returns the wrapped operation's error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            InterceptError::Operation(e) => Some(e),
            InterceptError::RateLimited(_) => None,
        }
    }
}

/// A metrics source could not produce a sample this tick.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    #[error("metrics source unavailable: {0}")]
    Unavailable(String),
}

/// The persisted history log could not be written.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history file I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Either half of a monitor tick failed.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error(transparent)]
    History(#[from] HistoryError),
}
