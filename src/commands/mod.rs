//! CLI command implementations for storefront-perf.
//!
//! This module provides implementations for all CLI subcommands:
//! - `report`: Sample the host and print the monitoring report
//! - `probe`: Drive the interceptor pipeline from the command line
//! - `config`: Configuration file generation

pub mod config;
pub mod probe;
pub mod report;

// Re-export command functions
pub use config::command_config;
pub use probe::command_probe;
pub use report::command_report;
