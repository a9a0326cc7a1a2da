//! CLI arguments and subcommands for storefront-perf.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "storefront-perf",
    about = "Performance control plane for the access-credential storefront",
    long_about = "Performance control plane for the access-credential storefront.\n\n\
                  Serves a TTL result cache, sliding-window rate limiting per client and \
                  operation, per-operation latency statistics and periodic host health \
                  monitoring over HTTP, with Prometheus export.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level, overriding the config file [default: info]
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Default cache TTL in seconds
    #[arg(long)]
    pub default_ttl: Option<u64>,

    /// Requests allowed per client and operation within one window
    #[arg(long)]
    pub max_requests: Option<usize>,

    /// Rate-limit window length in seconds
    #[arg(long)]
    pub window: Option<u64>,

    /// Seconds between health monitor samples
    #[arg(long)]
    pub monitor_interval: Option<u64>,

    /// Persisted monitoring log (empty string disables persistence)
    #[arg(long)]
    pub history_file: Option<PathBuf>,

    /// Disable the background health monitor
    #[arg(long)]
    pub disable_monitor: bool,

    /// Disable request rate limiting
    #[arg(long)]
    pub disable_rate_limit: bool,

    /// Disable the response cache
    #[arg(long)]
    pub disable_cache: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Sample the host and print a health report
    Report {
        /// Number of samples to take
        #[arg(short = 'n', long, default_value_t = 3)]
        samples: usize,

        /// Seconds between samples
        #[arg(short = 'i', long, default_value_t = 1)]
        interval: u64,
    },

    /// Drive the interceptor pipeline and print each outcome
    Probe {
        /// Client identity
        #[arg(long, default_value = "probe")]
        client: String,

        /// Operation name
        #[arg(long, default_value = "account_status")]
        operation: String,

        /// Arguments key used for caching
        #[arg(long, default_value = "")]
        arguments: String,

        /// Number of requests to send
        #[arg(short = 'n', long, default_value_t = 5)]
        requests: usize,

        /// Cache the operation for this many seconds (0 = do not cache)
        #[arg(long, default_value_t = 0)]
        cache_ttl: u64,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
