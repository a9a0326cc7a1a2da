//! Configuration management for storefront-perf.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use clap::ValueEnum;
use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storefront_perf::{CachePolicy, HealthThresholds, MonitorConfig, RateLimitPolicy};
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9310;
pub const DEFAULT_TTL_SECONDS: u64 = 300;
pub const DEFAULT_MAX_REQUESTS: usize = 100;
pub const DEFAULT_WINDOW_SECONDS: u64 = 60;
pub const DEFAULT_MONITOR_INTERVAL_SECONDS: u64 = 30;
pub const DEFAULT_HOUSEKEEPING_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_CPU_SAMPLE_MILLIS: u64 = 1000;
pub const DEFAULT_REPORT_TTL_SECONDS: u64 = 10;

/// Effective configuration. Every field is optional so that a partial file
/// only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Logging
    pub log_level: Option<String>,

    // Result cache
    #[serde(alias = "default-ttl-seconds")]
    pub default_ttl_seconds: Option<u64>,

    // Rate limiting
    #[serde(alias = "max-requests-per-window")]
    pub max_requests_per_window: Option<usize>,
    #[serde(alias = "window-seconds")]
    pub window_seconds: Option<u64>,

    // Latency recording
    #[serde(alias = "latency-max-samples")]
    pub latency_max_samples: Option<usize>,

    // Health monitoring
    #[serde(alias = "monitor-interval-seconds")]
    pub monitor_interval_seconds: Option<u64>,
    #[serde(alias = "max-history-samples")]
    pub max_history_samples: Option<usize>,
    #[serde(alias = "health-window-samples")]
    pub health_window_samples: Option<usize>,
    #[serde(alias = "warning-percent")]
    pub warning_percent: Option<f64>,
    #[serde(alias = "critical-percent")]
    pub critical_percent: Option<f64>,
    /// Persisted monitoring log; an empty string disables persistence
    #[serde(alias = "history-file")]
    pub history_file: Option<PathBuf>,
    #[serde(alias = "cpu-sample-millis")]
    pub cpu_sample_millis: Option<u64>,

    // Housekeeping
    #[serde(alias = "housekeeping-interval-seconds")]
    pub housekeeping_interval_seconds: Option<u64>,

    // Feature flags
    #[serde(alias = "enable-monitor")]
    pub enable_monitor: Option<bool>,
    #[serde(alias = "enable-rate-limit")]
    pub enable_rate_limit: Option<bool>,
    #[serde(alias = "enable-cache")]
    pub enable_cache: Option<bool>,

    // Kept last: TOML emits tables after plain values
    /// Operations whose responses are cached, with their TTL in seconds
    #[serde(alias = "cached-operations")]
    pub cached_operations: Option<BTreeMap<String, u64>>,
}

impl Default for Config {
    fn default() -> Self {
        let mut cached_operations = BTreeMap::new();
        cached_operations.insert("/report".to_string(), DEFAULT_REPORT_TTL_SECONDS);

        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            log_level: Some("info".into()),
            default_ttl_seconds: Some(DEFAULT_TTL_SECONDS),
            cached_operations: Some(cached_operations),
            max_requests_per_window: Some(DEFAULT_MAX_REQUESTS),
            window_seconds: Some(DEFAULT_WINDOW_SECONDS),
            latency_max_samples: Some(storefront_perf::latency::DEFAULT_MAX_SAMPLES),
            monitor_interval_seconds: Some(DEFAULT_MONITOR_INTERVAL_SECONDS),
            max_history_samples: Some(storefront_perf::history::DEFAULT_MAX_ENTRIES),
            health_window_samples: Some(10),
            warning_percent: Some(80.0),
            critical_percent: Some(90.0),
            history_file: Some(PathBuf::from(storefront_perf::history::DEFAULT_HISTORY_FILE)),
            cpu_sample_millis: Some(DEFAULT_CPU_SAMPLE_MILLIS),
            housekeeping_interval_seconds: Some(DEFAULT_HOUSEKEEPING_INTERVAL_SECONDS),
            enable_monitor: Some(true),
            enable_rate_limit: Some(true),
            enable_cache: Some(true),
        }
    }
}

impl Config {
    /// Parsed `log_level`; unset means info.
    pub fn log_level(&self) -> Result<LogLevel, String> {
        match self.log_level.as_deref() {
            None => Ok(LogLevel::Info),
            Some(level) => <LogLevel as ValueEnum>::from_str(level, true)
                .map_err(|_| format!("unknown log_level '{}'", level)),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS))
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(
            self.max_requests_per_window.unwrap_or(DEFAULT_MAX_REQUESTS),
            Duration::from_secs(self.window_seconds.unwrap_or(DEFAULT_WINDOW_SECONDS)),
        )
    }

    pub fn thresholds(&self) -> HealthThresholds {
        let defaults = HealthThresholds::default();
        HealthThresholds {
            warning_percent: self.warning_percent.unwrap_or(defaults.warning_percent),
            critical_percent: self.critical_percent.unwrap_or(defaults.critical_percent),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        let defaults = MonitorConfig::default();
        let max_history = self
            .max_history_samples
            .unwrap_or(defaults.max_history_samples);
        let history_file = match &self.history_file {
            Some(path) if path.as_os_str().is_empty() => None,
            Some(path) => Some(path.clone()),
            None => defaults.history_file,
        };

        MonitorConfig {
            interval: Duration::from_secs(
                self.monitor_interval_seconds
                    .unwrap_or(DEFAULT_MONITOR_INTERVAL_SECONDS),
            ),
            max_history_samples: max_history,
            health_window: self.health_window_samples.unwrap_or(defaults.health_window),
            thresholds: self.thresholds(),
            history_file,
            max_log_entries: max_history,
        }
    }

    /// Response cache policy: only the configured operations are cached.
    pub fn cache_policy(&self) -> CachePolicy {
        let operations: HashMap<String, Duration> = self
            .cached_operations
            .iter()
            .flatten()
            .map(|(op, secs)| (op.clone(), Duration::from_secs(*secs)))
            .collect();
        CachePolicy {
            default_ttl: None,
            operations,
        }
    }

    pub fn cpu_sample(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_millis.unwrap_or(DEFAULT_CPU_SAMPLE_MILLIS))
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(
            self.housekeeping_interval_seconds
                .unwrap_or(DEFAULT_HOUSEKEEPING_INTERVAL_SECONDS),
        )
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    cfg.log_level()?;

    let policy = cfg.rate_limit_policy();
    if policy.max_requests == 0 {
        return Err("max_requests_per_window must be greater than 0".into());
    }
    if policy.window.is_zero() {
        return Err("window_seconds must be greater than 0".into());
    }

    cfg.thresholds().validate()?;

    if cfg.monitor_interval_seconds == Some(0) {
        return Err("monitor_interval_seconds must be greater than 0".into());
    }
    if cfg.max_history_samples == Some(0) {
        return Err("max_history_samples must be greater than 0".into());
    }
    if cfg.health_window_samples == Some(0) {
        return Err("health_window_samples must be greater than 0".into());
    }
    if cfg.latency_max_samples == Some(0) {
        return Err("latency_max_samples must be greater than 0".into());
    }
    if cfg.housekeeping_interval_seconds == Some(0) {
        return Err("housekeeping_interval_seconds must be greater than 0".into());
    }

    if let Some(ops) = &cfg.cached_operations {
        if let Some((op, _)) = ops.iter().find(|(_, ttl)| **ttl == 0) {
            return Err(format!("cached operation '{}' has a TTL of 0 seconds", op).into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    if let Some(ttl) = args.default_ttl {
        config.default_ttl_seconds = Some(ttl);
    }
    if let Some(max) = args.max_requests {
        config.max_requests_per_window = Some(max);
    }
    if let Some(window) = args.window {
        config.window_seconds = Some(window);
    }
    if let Some(interval) = args.monitor_interval {
        config.monitor_interval_seconds = Some(interval);
    }
    if let Some(path) = &args.history_file {
        config.history_file = Some(path.clone());
    }

    // Feature flags
    if args.disable_monitor {
        config.enable_monitor = Some(false);
    }
    if args.disable_rate_limit {
        config.enable_rate_limit = Some(false);
    }
    if args.disable_cache {
        config.enable_cache = Some(false);
    }

    Ok(config)
}

/// Loads a config file, or the first default location that exists.
/// Fields missing from the file keep their built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let defaults = [
                "/etc/storefront-perf/config.yaml",
                "./storefront-perf.yaml",
                "./storefront-perf.json",
            ];
            defaults
                .iter()
                .find(|p| Path::new(p).exists())
                .map(PathBuf::from)
        }
    };

    let Some(path) = path else {
        return Ok(Config::default());
    };
    if !path.exists() {
        return Err(format!("config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    let loaded: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            config
        }
        Some("toml") => {
            let config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            config
        }
        _ => {
            // Default to YAML
            let config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            config
        }
    };

    Ok(merge_over_defaults(loaded))
}

/// Fills every unset field of `loaded` from [`Config::default`].
fn merge_over_defaults(loaded: Config) -> Config {
    let d = Config::default();
    Config {
        port: loaded.port.or(d.port),
        bind: loaded.bind.or(d.bind),
        log_level: loaded.log_level.or(d.log_level),
        default_ttl_seconds: loaded.default_ttl_seconds.or(d.default_ttl_seconds),
        cached_operations: loaded.cached_operations.or(d.cached_operations),
        max_requests_per_window: loaded.max_requests_per_window.or(d.max_requests_per_window),
        window_seconds: loaded.window_seconds.or(d.window_seconds),
        latency_max_samples: loaded.latency_max_samples.or(d.latency_max_samples),
        monitor_interval_seconds: loaded
            .monitor_interval_seconds
            .or(d.monitor_interval_seconds),
        max_history_samples: loaded.max_history_samples.or(d.max_history_samples),
        health_window_samples: loaded.health_window_samples.or(d.health_window_samples),
        warning_percent: loaded.warning_percent.or(d.warning_percent),
        critical_percent: loaded.critical_percent.or(d.critical_percent),
        history_file: loaded.history_file.or(d.history_file),
        cpu_sample_millis: loaded.cpu_sample_millis.or(d.cpu_sample_millis),
        housekeeping_interval_seconds: loaded
            .housekeeping_interval_seconds
            .or(d.housekeeping_interval_seconds),
        enable_monitor: loaded.enable_monitor.or(d.enable_monitor),
        enable_rate_limit: loaded.enable_rate_limit.or(d.enable_rate_limit),
        enable_cache: loaded.enable_cache.or(d.enable_cache),
    }
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}
