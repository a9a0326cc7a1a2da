//! Periodic memory reclamation for the request-path components.
//!
//! Lazy eviction keeps reads correct on its own, but entries that are never
//! read again and limiter keys that go quiet would otherwise accumulate. The
//! housekeeper purges both on a fixed cadence.

use crate::cache::TtlCache;
use crate::rate_limit::SlidingWindowLimiter;
use crate::worker::PeriodicWorker;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What one housekeeping pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub purged_entries: usize,
    pub reaped_keys: usize,
}

/// Cache janitor and limiter reaper.
pub struct Housekeeper<V> {
    cache: Option<Arc<TtlCache<V>>>,
    limiter: Option<Arc<SlidingWindowLimiter>>,
    worker: PeriodicWorker,
}

impl<V> Housekeeper<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        cache: Option<Arc<TtlCache<V>>>,
        limiter: Option<Arc<SlidingWindowLimiter>>,
    ) -> Self {
        Self {
            cache,
            limiter,
            worker: PeriodicWorker::new("housekeeper"),
        }
    }

    /// One pass over the cache and the limiter.
    pub fn sweep(&self) -> SweepReport {
        sweep(self.cache.as_deref(), self.limiter.as_deref())
    }

    /// Sweeps every `interval` on a background thread.
    pub fn start(&self, interval: Duration) -> std::io::Result<bool> {
        let cache = self.cache.clone();
        let limiter = self.limiter.clone();
        self.worker.start(interval, move || {
            sweep(cache.as_deref(), limiter.as_deref());
        })
    }

    pub fn stop(&self) -> bool {
        self.worker.stop()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}

fn sweep<V: Clone>(
    cache: Option<&TtlCache<V>>,
    limiter: Option<&SlidingWindowLimiter>,
) -> SweepReport {
    let report = SweepReport {
        purged_entries: cache.map(|c| c.purge_expired()).unwrap_or(0),
        reaped_keys: limiter.map(|l| l.reap()).unwrap_or(0),
    };
    if report != SweepReport::default() {
        debug!(
            purged_entries = report.purged_entries,
            reaped_keys = report.reaped_keys,
            "Housekeeping sweep"
        );
    }
    report
}
