//! Configuration types for host health monitoring.
//!
//! This module provides the thresholds that turn averaged usage percentages
//! into health levels, and the settings of the background monitor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::history::{DEFAULT_HISTORY_FILE, DEFAULT_MAX_ENTRIES};

/// Usage boundaries for the Good / Warning / Critical classification.
///
/// A resource is Good below `warning_percent`, Warning below
/// `critical_percent`, and Critical at or above it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    pub warning_percent: f64,
    pub critical_percent: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            warning_percent: 80.0,
            critical_percent: 90.0,
        }
    }
}

impl HealthThresholds {
    /// Checks `0 < warning < critical <= 100`.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.warning_percent > 0.0
            && self.warning_percent < self.critical_percent
            && self.critical_percent <= 100.0)
        {
            return Err(format!(
                "health thresholds must satisfy 0 < warning ({}) < critical ({}) <= 100",
                self.warning_percent, self.critical_percent
            ));
        }
        Ok(())
    }
}

/// Settings of the background health monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Time between sampling ticks.
    pub interval: Duration,
    /// In-memory ring buffer capacity.
    pub max_history_samples: usize,
    /// Number of most recent samples averaged by `get_health`.
    pub health_window: usize,
    pub thresholds: HealthThresholds,
    /// Persisted log location; `None` keeps history in memory only.
    pub history_file: Option<PathBuf>,
    /// Cap on persisted records.
    pub max_log_entries: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_history_samples: DEFAULT_MAX_ENTRIES,
            health_window: 10,
            thresholds: HealthThresholds::default(),
            history_file: Some(PathBuf::from(DEFAULT_HISTORY_FILE)),
            max_log_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}
