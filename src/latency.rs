//! Per-operation latency recording.
//!
//! Each operation keeps its most recent samples in a bounded FIFO window;
//! statistics are computed over that window. A lifetime request counter is
//! kept alongside so that eviction does not hide traffic volume.

use crate::clock::Clock;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_SAMPLES: usize = 1000;

/// A single timed invocation.
#[derive(Debug, Clone, Copy)]
pub struct LatencySample {
    pub duration_ms: f64,
    pub recorded_at: Instant,
}

/// Aggregates over the retained window of one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    /// Samples currently retained (never above the cap).
    pub count: usize,
    pub average_ms: f64,
    pub max_ms: f64,
    /// Every sample ever recorded, including evicted ones.
    pub total: u64,
}

#[derive(Default)]
struct OperationWindow {
    samples: VecDeque<LatencySample>,
    total: u64,
}

/// Records durations per operation name.
pub struct LatencyRecorder {
    windows: DashMap<String, OperationWindow>,
    max_samples: usize,
    clock: Arc<dyn Clock>,
}

impl LatencyRecorder {
    pub fn new(max_samples: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            max_samples: max_samples.max(1),
            clock,
        }
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Starts timing one invocation of `operation`.
    pub fn start_timer(&self, operation: &str) -> LatencyTimer<'_> {
        LatencyTimer {
            recorder: self,
            operation: operation.to_string(),
            start: self.clock.now(),
        }
    }

    /// Appends a sample, evicting the oldest once the cap is reached.
    pub fn record(&self, operation: &str, duration_ms: f64) {
        let sample = LatencySample {
            duration_ms,
            recorded_at: self.clock.now(),
        };
        let mut window = self.windows.entry(operation.to_string()).or_default();
        if window.samples.len() >= self.max_samples {
            window.samples.pop_front();
        }
        window.samples.push_back(sample);
        window.total += 1;
    }

    pub fn record_duration(&self, operation: &str, elapsed: Duration) {
        self.record(operation, elapsed.as_secs_f64() * 1000.0);
    }

    /// Runs `work`, recording its duration whether it succeeds or fails.
    pub fn time<T, E>(&self, operation: &str, work: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let timer = self.start_timer(operation);
        let result = work();
        timer.finish();
        result
    }

    /// Stats for `operation`; all zero if nothing was recorded.
    pub fn stats(&self, operation: &str) -> LatencyStats {
        match self.windows.get(operation) {
            Some(window) => summarize(&window),
            None => LatencyStats::default(),
        }
    }

    /// Stats for every known operation, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, LatencyStats)> {
        let mut out: Vec<(String, LatencyStats)> = self
            .windows
            .iter()
            .map(|e| (e.key().clone(), summarize(e.value())))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Forgets everything recorded for `operation`.
    pub fn reset(&self, operation: &str) {
        self.windows.remove(operation);
    }
}

/// Measurement in progress; nothing is recorded until [`LatencyTimer::finish`].
#[must_use = "a timer records nothing until finished"]
pub struct LatencyTimer<'a> {
    recorder: &'a LatencyRecorder,
    operation: String,
    start: Instant,
}

impl LatencyTimer<'_> {
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Records the elapsed time and returns it.
    pub fn finish(self) -> Duration {
        let elapsed = self
            .recorder
            .clock
            .now()
            .saturating_duration_since(self.start);
        self.recorder.record_duration(&self.operation, elapsed);
        elapsed
    }
}

fn summarize(window: &OperationWindow) -> LatencyStats {
    let count = window.samples.len();
    if count == 0 {
        return LatencyStats {
            total: window.total,
            ..LatencyStats::default()
        };
    }

    let (sum, max) = window
        .samples
        .iter()
        .fold((0.0_f64, f64::MIN), |(sum, max), s| {
            (sum + s.duration_ms, max.max(s.duration_ms))
        });

    LatencyStats {
        count,
        average_ms: sum / count as f64,
        max_ms: max,
        total: window.total,
    }
}
