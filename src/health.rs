//! Host health monitoring.
//!
//! [`HealthMonitor`] samples CPU, memory, disk, network and process count on a
//! fixed cadence from a [`MetricsSource`], keeps a bounded in-memory history,
//! appends every sample to a bounded on-disk log and classifies the recent
//! average usage of each resource.
//!
//! # Usage
//!
//! ```rust
//! use storefront_perf::health::HealthMonitor;
//! use storefront_perf::health_config::MonitorConfig;
//! use storefront_perf::sampler::{MetricSample, SystemMetrics};
//!
//! let config = MonitorConfig { history_file: None, ..MonitorConfig::default() };
//! let monitor = HealthMonitor::without_source(config);
//!
//! monitor.record(MetricSample::now(SystemMetrics {
//!     cpu_percent: 85.0,
//!     ..SystemMetrics::default()
//! }))
//! .unwrap();
//!
//! let health = monitor.get_health();
//! println!("CPU: {} ({}%)", health.cpu_health, health.average_cpu);
//! ```

use crate::error::{MonitorError, SampleError};
use crate::health_config::{HealthThresholds, MonitorConfig};
use crate::history::HistoryLog;
use crate::ringbuffer::Ringbuffer;
use crate::sampler::{MetricSample, MetricsSource};
use crate::worker::PeriodicWorker;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Health classification of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum HealthLevel {
    Good,
    Warning,
    Critical,
}

impl HealthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Good => "Good",
            HealthLevel::Warning => "Warning",
            HealthLevel::Critical => "Critical",
        }
    }

    /// Numeric severity, higher is worse.
    pub fn severity(&self) -> u8 {
        match self {
            HealthLevel::Good => 0,
            HealthLevel::Warning => 1,
            HealthLevel::Critical => 2,
        }
    }
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an average usage percentage.
///
/// - Good if `percent < warning_percent`
/// - Warning if `percent < critical_percent`
/// - Critical otherwise
pub fn classify(percent: f64, thresholds: &HealthThresholds) -> HealthLevel {
    if percent < thresholds.warning_percent {
        HealthLevel::Good
    } else if percent < thresholds.critical_percent {
        HealthLevel::Warning
    } else {
        HealthLevel::Critical
    }
}

/// Health derived from the most recent samples.
///
/// With no samples every average is 0 and every level is Good; `samples`
/// tells that case apart from a genuinely idle host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthStatus {
    pub cpu_health: HealthLevel,
    pub memory_health: HealthLevel,
    pub disk_health: HealthLevel,
    /// Averages rounded to two decimals.
    pub average_cpu: f64,
    pub average_memory: f64,
    pub average_disk: f64,
    /// Number of samples the averages were computed over.
    pub samples: usize,
}

impl HealthStatus {
    /// Worst level across all resources.
    pub fn overall(&self) -> HealthLevel {
        self.cpu_health
            .max(self.memory_health)
            .max(self.disk_health)
    }

    pub fn has_data(&self) -> bool {
        self.samples > 0
    }

    /// Computes health from `recent` samples (already limited to the window).
    pub fn from_samples(recent: &[MetricSample], thresholds: &HealthThresholds) -> Self {
        let cpu = average(recent.iter().map(|s| s.metrics.cpu_percent));
        let memory = average(recent.iter().map(|s| s.metrics.memory_percent));
        let disk = average(recent.iter().map(|s| s.metrics.disk_percent));

        Self {
            cpu_health: classify(cpu, thresholds),
            memory_health: classify(memory, thresholds),
            disk_health: classify(disk, thresholds),
            average_cpu: round2(cpu),
            average_memory: round2(memory),
            average_disk: round2(disk),
            samples: recent.len(),
        }
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Monitor counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MonitorStats {
    pub ticks: u64,
    pub failures: u64,
    pub samples: usize,
}

/// Source used when the monitor is only fed through [`HealthMonitor::record`].
struct NoSource;

impl MetricsSource for NoSource {
    fn collect(&mut self) -> Result<MetricSample, SampleError> {
        Err(SampleError::Unavailable("no metrics source configured".into()))
    }
}

struct MonitorInner {
    config: MonitorConfig,
    source: Mutex<Box<dyn MetricsSource>>,
    history: Mutex<Ringbuffer<MetricSample>>,
    log: Option<HistoryLog>,
    ticks: AtomicU64,
    failures: AtomicU64,
}

impl MonitorInner {
    fn sample_once(&self) -> Result<MetricSample, MonitorError> {
        self.ticks.fetch_add(1, Ordering::Relaxed);

        let collected = {
            let mut source = self.source.lock().unwrap_or_else(|e| e.into_inner());
            source.collect()
        };
        let sample = match collected {
            Ok(sample) => sample,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(e.into());
            }
        };

        self.record(sample).map_err(|e| {
            self.failures.fetch_add(1, Ordering::Relaxed);
            e
        })?;
        Ok(sample)
    }

    fn record(&self, sample: MetricSample) -> Result<(), MonitorError> {
        {
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            history.push(sample);
        }

        let m = &sample.metrics;
        info!(
            "[{}] CPU: {:.1}% | Memory: {:.1}% | Disk: {:.1}%",
            sample.timestamp.format("%Y-%m-%dT%H:%M:%S"),
            m.cpu_percent,
            m.memory_percent,
            m.disk_percent
        );

        // File I/O happens after the history lock is released.
        if let Some(log) = &self.log {
            log.append(&sample)?;
        }
        Ok(())
    }

    fn recent(&self, n: usize) -> Vec<MetricSample> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last_n(n)
    }

    fn all(&self) -> Vec<MetricSample> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_history()
    }
}

/// Background sampler with bounded history and health classification.
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
    worker: PeriodicWorker,
}

impl HealthMonitor {
    pub fn new(config: MonitorConfig, source: Box<dyn MetricsSource>) -> Self {
        let log = config
            .history_file
            .as_ref()
            .map(|path| HistoryLog::new(path, config.max_log_entries));
        let history = Ringbuffer::new(config.max_history_samples);

        Self {
            inner: Arc::new(MonitorInner {
                config,
                source: Mutex::new(source),
                history: Mutex::new(history),
                log,
                ticks: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
            worker: PeriodicWorker::new("health-monitor"),
        }
    }

    /// Monitor that is only fed through [`HealthMonitor::record`].
    pub fn without_source(config: MonitorConfig) -> Self {
        Self::new(config, Box::new(NoSource))
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Starts sampling every `interval`. No-op if already running.
    #[instrument(skip(self))]
    pub fn start_monitoring(&self, interval: Duration) -> std::io::Result<bool> {
        let inner = self.inner.clone();
        let started = self.worker.start(interval, move || {
            if let Err(e) = inner.sample_once() {
                warn!("Monitoring tick failed: {} - retrying next interval", e);
            }
        })?;
        if started {
            info!("System monitoring started");
        }
        Ok(started)
    }

    /// Starts sampling at the configured interval.
    pub fn start(&self) -> std::io::Result<bool> {
        self.start_monitoring(self.inner.config.interval)
    }

    /// Stops sampling and waits for the in-flight tick to finish.
    pub fn stop_monitoring(&self) -> bool {
        let stopped = self.worker.stop();
        if stopped {
            info!("System monitoring stopped");
        }
        stopped
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Runs one sampling tick on the calling thread.
    pub fn sample_once(&self) -> Result<MetricSample, MonitorError> {
        self.inner.sample_once()
    }

    /// Adds an externally produced sample to the history and the log.
    ///
    /// A log failure is reported by the return value but the in-memory
    /// history is updated regardless.
    pub fn record(&self, sample: MetricSample) -> Result<(), MonitorError> {
        self.inner.record(sample)
    }

    /// Health over the last `health_window` samples.
    pub fn get_health(&self) -> HealthStatus {
        let recent = self.inner.recent(self.inner.config.health_window);
        HealthStatus::from_samples(&recent, &self.inner.config.thresholds)
    }

    /// Every retained sample, oldest first.
    pub fn history(&self) -> Vec<MetricSample> {
        self.inner.all()
    }

    pub fn sample_count(&self) -> usize {
        self.inner
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            ticks: self.inner.ticks.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
            samples: self.sample_count(),
        }
    }

    /// Text report stamped with the current local time.
    pub fn generate_report(&self) -> String {
        self.generate_report_at(chrono::Local::now().naive_local())
    }

    /// Text report stamped with `now`.
    pub fn generate_report_at(&self, now: NaiveDateTime) -> String {
        let health = self.get_health();
        let history = self.inner.all();
        debug!(samples = history.len(), "Generating health report");

        let peak = |f: fn(&MetricSample) -> f64| {
            history.iter().map(f).fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            })
        };
        let max_cpu = peak(|s| s.metrics.cpu_percent).unwrap_or(0.0);
        let max_memory = peak(|s| s.metrics.memory_percent).unwrap_or(0.0);

        let mut out = String::new();
        writeln!(out, "=== System Monitoring Report ===").ok();
        writeln!(out, "Time: {}", now.format("%Y/%m/%d %H:%M:%S")).ok();
        writeln!(out).ok();
        writeln!(out, "Health Status:").ok();
        writeln!(out, "  CPU: {} ({}%)", health.cpu_health, health.average_cpu).ok();
        writeln!(
            out,
            "  Memory: {} ({}%)",
            health.memory_health, health.average_memory
        )
        .ok();
        writeln!(out, "  Disk: {} ({}%)", health.disk_health, health.average_disk).ok();
        writeln!(out).ok();
        writeln!(out, "Recent Statistics:").ok();
        writeln!(out, "  Samples collected: {}", history.len()).ok();
        writeln!(out, "  Peak CPU usage: {:.1}%", max_cpu).ok();
        writeln!(out, "  Peak memory usage: {:.1}%", max_memory).ok();
        out
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SystemMetrics;

    fn memory_only_config() -> MonitorConfig {
        MonitorConfig {
            history_file: None,
            ..MonitorConfig::default()
        }
    }

    fn sample(cpu: f64, memory: f64, disk: f64) -> MetricSample {
        MetricSample::now(SystemMetrics {
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
            ..SystemMetrics::default()
        })
    }

    #[test]
    fn test_classify_boundaries() {
        let t = HealthThresholds::default();
        assert_eq!(classify(79.9, &t), HealthLevel::Good);
        assert_eq!(classify(80.0, &t), HealthLevel::Warning);
        assert_eq!(classify(89.9, &t), HealthLevel::Warning);
        assert_eq!(classify(90.0, &t), HealthLevel::Critical);
        assert_eq!(classify(100.0, &t), HealthLevel::Critical);
    }

    #[test]
    fn test_no_samples_is_good_without_data() {
        let monitor = HealthMonitor::without_source(memory_only_config());
        let health = monitor.get_health();
        assert_eq!(health.overall(), HealthLevel::Good);
        assert_eq!(health.average_cpu, 0.0);
        assert!(!health.has_data());
    }

    #[test]
    fn test_average_uses_last_ten() {
        let monitor = HealthMonitor::without_source(memory_only_config());
        // Five old critical samples, then ten calm ones.
        for _ in 0..5 {
            monitor.record(sample(99.0, 99.0, 99.0)).unwrap();
        }
        for _ in 0..10 {
            monitor.record(sample(10.0, 20.0, 30.0)).unwrap();
        }
        let health = monitor.get_health();
        assert_eq!(health.samples, 10);
        assert_eq!(health.average_cpu, 10.0);
        assert_eq!(health.overall(), HealthLevel::Good);
    }

    #[test]
    fn test_resources_classified_independently() {
        let monitor = HealthMonitor::without_source(memory_only_config());
        monitor.record(sample(50.0, 85.0, 95.0)).unwrap();
        let health = monitor.get_health();
        assert_eq!(health.cpu_health, HealthLevel::Good);
        assert_eq!(health.memory_health, HealthLevel::Warning);
        assert_eq!(health.disk_health, HealthLevel::Critical);
        assert_eq!(health.overall(), HealthLevel::Critical);
    }

    #[test]
    fn test_averages_rounded_to_two_decimals() {
        let monitor = HealthMonitor::without_source(memory_only_config());
        monitor.record(sample(10.0, 0.0, 0.0)).unwrap();
        monitor.record(sample(10.0, 0.0, 0.0)).unwrap();
        monitor.record(sample(10.5, 0.0, 0.0)).unwrap();
        assert_eq!(monitor.get_health().average_cpu, 10.17);
    }

    #[test]
    fn test_sample_failure_counts_and_keeps_history() {
        let monitor = HealthMonitor::without_source(memory_only_config());
        assert!(matches!(
            monitor.sample_once(),
            Err(MonitorError::Sample(SampleError::Unavailable(_)))
        ));
        let stats = monitor.stats();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.samples, 0);
    }

    #[test]
    fn test_report_template() {
        let monitor = HealthMonitor::without_source(memory_only_config());
        monitor.record(sample(95.0, 40.0, 10.0)).unwrap();
        monitor.record(sample(85.0, 60.0, 10.0)).unwrap();
        let now = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(8, 5, 1)
            .unwrap();
        let report = monitor.generate_report_at(now);
        assert!(report.contains("Time: 2024/03/09 08:05:01"));
        assert!(report.contains("CPU: Critical (90%)"));
        assert!(report.contains("Memory: Good (50%)"));
        assert!(report.contains("Samples collected: 2"));
        assert!(report.contains("Peak CPU usage: 95.0%"));
        assert!(report.contains("Peak memory usage: 60.0%"));
    }
}
