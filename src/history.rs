//! Bounded on-disk history of monitor samples.
//!
//! The file holds a single JSON array. Every append reads the array, pushes
//! the new record, keeps the last `max_entries` records and rewrites the
//! whole file. A missing or unreadable file counts as an empty history.
//! Appends through one `HistoryLog` (or its clones) are serialized.

use crate::error::HistoryError;
use crate::sampler::MetricSample;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const DEFAULT_HISTORY_FILE: &str = "monitoring.log";
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// JSON-array log file capped at a fixed number of records.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
    max_entries: usize,
    /// Held for the whole read-append-rewrite cycle.
    write_lock: Arc<Mutex<()>>,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries: max_entries.max(1),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Appends one record and returns how many records the file now holds.
    pub fn append(&self, sample: &MetricSample) -> Result<usize, HistoryError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.read_records();
        records.push(serde_json::to_value(sample)?);

        if records.len() > self.max_entries {
            let excess = records.len() - self.max_entries;
            records.drain(..excess);
        }

        let body = serde_json::to_string_pretty(&records)?;
        self.write_atomically(body.as_bytes())?;
        debug!(
            path = %self.path.display(),
            records = records.len(),
            "History log rewritten"
        );
        Ok(records.len())
    }

    /// Reads every record that parses as a sample, oldest first.
    pub fn load(&self) -> Vec<MetricSample> {
        self.read_records()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }

    /// Raw records; anything other than a readable JSON array yields none.
    fn read_records(&self) -> Vec<Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(
                    "Cannot read history file {}: {} - starting with empty history",
                    self.path.display(),
                    e
                );
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Value>>(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "History file {} is corrupt: {} - starting with empty history",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    fn write_atomically(&self, body: &[u8]) -> Result<(), HistoryError> {
        let io_err = |source| HistoryError::Io {
            path: self.path.display().to_string(),
            source,
        };

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, body).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SystemMetrics;

    fn sample(cpu: f64) -> MetricSample {
        MetricSample::now(SystemMetrics {
            cpu_percent: cpu,
            ..SystemMetrics::default()
        })
    }

    #[test]
    fn test_append_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("monitoring.log"), 10);
        assert_eq!(log.append(&sample(1.0)).unwrap(), 1);
        assert_eq!(log.load().len(), 1);
    }

    #[test]
    fn test_cap_keeps_last_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("monitoring.log"), 3);
        for i in 0..5 {
            log.append(&sample(i as f64)).unwrap();
        }
        let cpus: Vec<f64> = log.load().iter().map(|s| s.metrics.cpu_percent).collect();
        assert_eq!(cpus, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitoring.log");
        fs::write(&path, "{not json").unwrap();
        let log = HistoryLog::new(&path, 10);
        assert!(log.load().is_empty());
        assert_eq!(log.append(&sample(5.0)).unwrap(), 1);
        assert_eq!(log.load()[0].metrics.cpu_percent, 5.0);
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("monitoring.log"), 1000);

        std::thread::scope(|s| {
            for t in 0..4 {
                let log = log.clone();
                s.spawn(move || {
                    for i in 0..20 {
                        log.append(&sample((t * 100 + i) as f64)).unwrap();
                    }
                });
            }
        });

        assert_eq!(log.load().len(), 80);
    }

    #[test]
    fn test_unwritable_location_errors() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("missing/dir/monitoring.log"), 10);
        assert!(matches!(
            log.append(&sample(1.0)),
            Err(HistoryError::Io { .. })
        ));
    }
}
