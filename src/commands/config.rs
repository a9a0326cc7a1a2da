//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("storefront-perf.yaml"));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Storefront Performance Configuration
# ====================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                      # Bind IP (0.0.0.0 = all interfaces)
# port: 9310                           # HTTP port
# log_level: "info"                    # off, error, warn, info, debug, trace
#
# Result Cache
# ------------
# default_ttl_seconds: 300             # TTL for entries stored without one
# cached_operations:                   # Route -> TTL in seconds
#   /report: 10
#
# Rate Limiting
# -------------
# max_requests_per_window: 100         # Requests per client and operation
# window_seconds: 60                   # Sliding window length
#
# Latency Recording
# -----------------
# latency_max_samples: 1000            # Samples kept per operation
#
# Health Monitoring
# -----------------
# monitor_interval_seconds: 30         # Seconds between samples
# max_history_samples: 1000            # In-memory and on-disk history cap
# health_window_samples: 10            # Samples averaged for health
# warning_percent: 80                  # Warning at or above
# critical_percent: 90                 # Critical at or above
# history_file: "monitoring.log"       # "" keeps history in memory only
# cpu_sample_millis: 1000              # CPU measurement span for the first sample
#
# Housekeeping
# ------------
# housekeeping_interval_seconds: 60    # Expired cache entries and idle limiter keys
#
# Feature Flags
# -------------
# enable_monitor: true
# enable_rate_limit: true
# enable_cache: true
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_parseable_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        command_config(Some(path.clone()), ConfigFormat::Yaml, true).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Storefront Performance Configuration"));
        let parsed: Config = serde_yaml::from_str(&content).unwrap();
        assert_eq!(parsed.window_seconds, Some(60));
    }
}
