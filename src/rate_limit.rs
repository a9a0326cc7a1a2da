//! Sliding-window admission control keyed by `(client, operation)`.
//!
//! Each key owns the timestamps of its admitted requests that are still inside
//! the trailing window. A request is admitted while fewer than `max_requests`
//! timestamps remain after pruning. Denied requests leave the window untouched.

use crate::clock::Clock;
use crate::error::RateLimitExceeded;
use ahash::AHashMap as HashMap;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Request budget for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub max_requests: usize,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    client: String,
    operation: String,
}

/// Snapshot of limiter counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LimiterStats {
    pub tracked_keys: usize,
    pub allowed: u64,
    pub denied: u64,
}

/// Per-key sliding-window rate limiter.
pub struct SlidingWindowLimiter {
    windows: DashMap<WindowKey, VecDeque<Instant>>,
    default_policy: RateLimitPolicy,
    overrides: HashMap<String, RateLimitPolicy>,
    clock: Arc<dyn Clock>,
    allowed: AtomicU64,
    denied: AtomicU64,
}

impl SlidingWindowLimiter {
    pub fn new(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            default_policy: policy,
            overrides: HashMap::new(),
            clock,
            allowed: AtomicU64::new(0),
            denied: AtomicU64::new(0),
        }
    }

    /// Uses `policy` instead of the default for `operation`.
    pub fn with_operation_policy(
        mut self,
        operation: impl Into<String>,
        policy: RateLimitPolicy,
    ) -> Self {
        self.overrides.insert(operation.into(), policy);
        self
    }

    /// Policy in force for `operation`.
    pub fn policy_for(&self, operation: &str) -> RateLimitPolicy {
        self.overrides
            .get(operation)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Admission decision at the clock's current time.
    pub fn allow(&self, client: &str, operation: &str) -> bool {
        self.allow_at(client, operation, self.clock.now())
    }

    /// Admission decision at an explicit instant.
    pub fn allow_at(&self, client: &str, operation: &str, now: Instant) -> bool {
        self.check_at(client, operation, now).is_ok()
    }

    /// Like [`SlidingWindowLimiter::allow`] but reports how long to wait on denial.
    pub fn check(&self, client: &str, operation: &str) -> Result<(), RateLimitExceeded> {
        self.check_at(client, operation, self.clock.now())
    }

    pub fn check_at(
        &self,
        client: &str,
        operation: &str,
        now: Instant,
    ) -> Result<(), RateLimitExceeded> {
        let policy = self.policy_for(operation);
        let key = WindowKey {
            client: client.to_string(),
            operation: operation.to_string(),
        };

        let mut window = self.windows.entry(key).or_default();
        prune(&mut window, now, policy.window);

        if window.len() >= policy.max_requests {
            let retry_after = window
                .front()
                .map(|oldest| policy.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(policy.window);
            drop(window);

            self.denied.fetch_add(1, Ordering::Relaxed);
            debug!(
                client,
                operation,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            return Err(RateLimitExceeded {
                client: client.to_string(),
                operation: operation.to_string(),
                retry_after,
            });
        }

        window.push_back(now);
        self.allowed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Requests currently counted against `(client, operation)` at `now`.
    pub fn current_count(&self, client: &str, operation: &str, now: Instant) -> usize {
        let window = self.policy_for(operation).window;
        let key = WindowKey {
            client: client.to_string(),
            operation: operation.to_string(),
        };
        self.windows
            .get(&key)
            .map(|q| {
                q.iter()
                    .filter(|t| now.saturating_duration_since(**t) < window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Prunes every window and drops keys left empty. Returns the number of
    /// keys removed.
    pub fn reap(&self) -> usize {
        self.reap_at(self.clock.now())
    }

    pub fn reap_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|key, q| {
            prune(q, now, self.policy_for(&key.operation).window);
            !q.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    /// Number of keys currently holding a window.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            tracked_keys: self.windows.len(),
            allowed: self.allowed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
        }
    }
}

/// Keeps only timestamps `t` with `now - t < window`.
fn prune(window: &mut VecDeque<Instant>, now: Instant, span: Duration) {
    window.retain(|t| now.saturating_duration_since(*t) < span);
}
