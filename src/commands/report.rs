//! Report command implementation.
//!
//! Samples the host a few times and prints the monitoring report.

use anyhow::bail;
use std::thread;
use std::time::Duration;
use storefront_perf::{HealthMonitor, ProcMetricsSource};
use tracing::warn;

use crate::config::Config;

/// Takes `samples` samples `interval` seconds apart, then prints the report.
pub fn command_report(
    samples: usize,
    interval: u64,
    config: &Config,
) -> anyhow::Result<()> {
    println!("🩺 Storefront Performance - Host Report");
    println!("=======================================");

    let source = ProcMetricsSource::new(config.cpu_sample());
    let monitor = HealthMonitor::new(config.monitor_config(), Box::new(source));

    let mut failures = 0;
    for n in 1..=samples {
        match monitor.sample_once() {
            Ok(sample) => {
                let m = &sample.metrics;
                println!(
                    "   ├─ Sample {}/{}: CPU {:.1}% | Memory {:.1}% | Disk {:.1}%",
                    n, samples, m.cpu_percent, m.memory_percent, m.disk_percent
                );
            }
            Err(e) => {
                failures += 1;
                warn!("Sample {} failed: {}", n, e);
                println!("   ├─ ❌ Sample {}/{}: {}", n, samples, e);
            }
        }
        if n < samples {
            thread::sleep(Duration::from_secs(interval));
        }
    }

    if failures == samples && samples > 0 {
        bail!("no sample could be collected");
    }

    println!();
    print!("{}", monitor.generate_report());
    Ok(())
}
