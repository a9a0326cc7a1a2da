//! Host resource sampling.
//!
//! [`MetricsSource`] is the seam between the health monitor and the operating
//! system. [`ProcMetricsSource`] reads Linux `/proc` and `statvfs`; tests plug
//! in scripted sources instead.

use crate::error::SampleError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Resource usage figures for one sampling tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    /// Available memory in GB.
    #[serde(rename = "memory_available")]
    pub memory_available_gb: f64,
    pub disk_percent: f64,
    /// Free disk space in GB.
    #[serde(rename = "disk_free")]
    pub disk_free_gb: f64,
    /// Cumulative bytes sent, in MB.
    #[serde(rename = "network_sent")]
    pub network_sent_mb: f64,
    /// Cumulative bytes received, in MB.
    #[serde(rename = "network_recv")]
    pub network_recv_mb: f64,
    pub process_count: u64,
}

/// A timestamped sample; serializes directly as one history log record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: NaiveDateTime,
    #[serde(rename = "system_metrics")]
    pub metrics: SystemMetrics,
}

impl MetricSample {
    pub fn new(timestamp: NaiveDateTime, metrics: SystemMetrics) -> Self {
        Self { timestamp, metrics }
    }

    /// Stamps `metrics` with the current local time.
    pub fn now(metrics: SystemMetrics) -> Self {
        Self::new(chrono::Local::now().naive_local(), metrics)
    }
}

/// Produces one sample per call. May block briefly.
pub trait MetricsSource: Send {
    fn collect(&mut self) -> Result<MetricSample, SampleError>;
}

/// Aggregate CPU jiffies from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

impl CpuTimes {
    /// Busy percentage between `earlier` and `self`.
    pub fn usage_since(&self, earlier: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }
        let busy = self.busy.saturating_sub(earlier.busy);
        (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat` content.
pub fn parse_cpu_times(content: &str) -> Result<CpuTimes, SampleError> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| SampleError::Parse {
            what: "/proc/stat",
            detail: "no aggregate cpu line".to_string(),
        })?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|v| v.parse::<u64>().unwrap_or(0))
        .collect();
    if fields.len() < 4 {
        return Err(SampleError::Parse {
            what: "/proc/stat",
            detail: format!("expected at least 4 cpu fields, got {}", fields.len()),
        });
    }

    // user nice system idle iowait irq softirq steal; guest time is already in user.
    let total: u64 = fields.iter().take(8).sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

/// Memory totals from `/proc/meminfo`, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl MemoryInfo {
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        used as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Parses `MemTotal` and `MemAvailable` from `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> Result<MemoryInfo, SampleError> {
    let mut total_bytes: Option<u64> = None;
    let mut available_bytes: Option<u64> = None;

    for line in content.lines() {
        let target = if line.starts_with("MemTotal:") {
            &mut total_bytes
        } else if line.starts_with("MemAvailable:") {
            &mut available_bytes
        } else {
            continue;
        };
        if let Some(kb) = line
            .split_whitespace()
            .nth(1)
            .and_then(|v| v.parse::<u64>().ok())
        {
            *target = Some(kb * 1024);
        }
        if total_bytes.is_some() && available_bytes.is_some() {
            break;
        }
    }

    match (total_bytes, available_bytes) {
        (Some(total_bytes), Some(available_bytes)) => Ok(MemoryInfo {
            total_bytes,
            available_bytes,
        }),
        _ => Err(SampleError::Parse {
            what: "/proc/meminfo",
            detail: "MemTotal or MemAvailable missing".to_string(),
        }),
    }
}

/// Sums receive and transmit bytes over all interfaces in `/proc/net/dev`
/// content. Returns `(rx_bytes, tx_bytes)`.
pub fn parse_netdev_totals(content: &str) -> (u64, u64) {
    let mut rx = 0u64;
    let mut tx = 0u64;

    // The first two lines are headers.
    for line in content.lines().skip(2) {
        let Some((_iface, stats)) = line.split_once(':') else {
            continue;
        };
        let values: Vec<&str> = stats.split_whitespace().collect();
        if values.len() < 16 {
            continue;
        }
        rx = rx.saturating_add(values[0].parse().unwrap_or(0));
        tx = tx.saturating_add(values[8].parse().unwrap_or(0));
    }

    (rx, tx)
}

/// Disk usage for the filesystem holding a path, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub used_bytes: u64,
    pub available_bytes: u64,
}

impl DiskUsage {
    /// Used share of the space visible to unprivileged users.
    pub fn used_percent(&self) -> f64 {
        let visible = self.used_bytes + self.available_bytes;
        if visible == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / visible as f64 * 100.0
    }
}

/// Reads disk usage with libc `statvfs`.
pub fn read_disk_usage(path: &Path) -> Result<DiskUsage, SampleError> {
    use std::ffi::CString;
    use std::mem;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| SampleError::Parse {
        what: "disk path",
        detail: e.to_string(),
    })?;

    // SAFETY: statvfs only writes into the zeroed struct we own and reads the
    // NUL-terminated path.
    let stat = unsafe {
        let mut stat: libc::statvfs = mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(SampleError::Read {
                path: path.display().to_string(),
                source: std::io::Error::last_os_error(),
            });
        }
        stat
    };

    let block_size = stat.f_frsize as u64;
    let total = block_size * stat.f_blocks as u64;
    let free = block_size * stat.f_bfree as u64;
    let available = block_size * stat.f_bavail as u64;

    Ok(DiskUsage {
        used_bytes: total.saturating_sub(free),
        available_bytes: available,
    })
}

/// Counts numeric directories (PIDs) under a proc root.
pub fn count_processes(proc_root: &Path) -> Result<u64, SampleError> {
    let entries = fs::read_dir(proc_root).map_err(|e| SampleError::Read {
        path: proc_root.display().to_string(),
        source: e,
    })?;

    Ok(entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()))
        })
        .count() as u64)
}

fn read_file(path: &Path) -> Result<String, SampleError> {
    fs::read_to_string(path).map_err(|e| SampleError::Read {
        path: path.display().to_string(),
        source: e,
    })
}

/// Samples the local Linux host.
pub struct ProcMetricsSource {
    proc_root: PathBuf,
    disk_path: PathBuf,
    cpu_prime: Duration,
    previous_cpu: Option<CpuTimes>,
}

impl ProcMetricsSource {
    /// `cpu_prime` is how long the very first sample waits between two
    /// `/proc/stat` reads; later samples measure against the previous tick.
    pub fn new(cpu_prime: Duration) -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            disk_path: PathBuf::from("/"),
            cpu_prime,
            previous_cpu: None,
        }
    }

    pub fn with_disk_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.disk_path = path.into();
        self
    }

    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    fn read_cpu(&self) -> Result<CpuTimes, SampleError> {
        parse_cpu_times(&read_file(&self.proc_root.join("stat"))?)
    }

    fn cpu_percent(&mut self) -> Result<f64, SampleError> {
        let earlier = match self.previous_cpu {
            Some(prev) => prev,
            None => {
                let first = self.read_cpu()?;
                std::thread::sleep(self.cpu_prime);
                first
            }
        };
        let current = self.read_cpu()?;
        self.previous_cpu = Some(current);
        Ok(current.usage_since(&earlier))
    }
}

impl MetricsSource for ProcMetricsSource {
    fn collect(&mut self) -> Result<MetricSample, SampleError> {
        let cpu_percent = self.cpu_percent()?;
        let memory = parse_meminfo(&read_file(&self.proc_root.join("meminfo"))?)?;
        let disk = read_disk_usage(&self.disk_path)?;
        let (rx, tx) = parse_netdev_totals(&read_file(&self.proc_root.join("net/dev"))?);
        let process_count = count_processes(&self.proc_root)?;

        Ok(MetricSample::now(SystemMetrics {
            cpu_percent,
            memory_percent: memory.used_percent(),
            memory_available_gb: memory.available_bytes as f64 / BYTES_PER_GB,
            disk_percent: disk.used_percent(),
            disk_free_gb: disk.available_bytes as f64 / BYTES_PER_GB,
            network_sent_mb: tx as f64 / BYTES_PER_MB,
            network_recv_mb: rx as f64 / BYTES_PER_MB,
            process_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_times() {
        let stat = "cpu  100 0 100 700 100 0 0 0 0 0\ncpu0 50 0 50 350 50 0 0 0 0 0\n";
        let times = parse_cpu_times(stat).unwrap();
        assert_eq!(times.total, 1000);
        assert_eq!(times.busy, 200);
    }

    #[test]
    fn test_cpu_usage_delta() {
        let a = CpuTimes { busy: 200, total: 1000 };
        let b = CpuTimes { busy: 500, total: 2000 };
        assert!((b.usage_since(&a) - 30.0).abs() < 1e-9);
        assert_eq!(a.usage_since(&a), 0.0);
    }

    #[test]
    fn test_parse_cpu_times_missing_line() {
        assert!(parse_cpu_times("intr 1 2 3\n").is_err());
    }

    #[test]
    fn test_parse_meminfo() {
        let content = "MemTotal:       16000 kB\nMemFree:         1000 kB\nMemAvailable:    4000 kB\n";
        let mem = parse_meminfo(content).unwrap();
        assert_eq!(mem.total_bytes, 16000 * 1024);
        assert!((mem.used_percent() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_meminfo_incomplete() {
        assert!(parse_meminfo("MemTotal: 100 kB\n").is_err());
    }

    #[test]
    fn test_parse_netdev_totals() {
        let content = "Inter-|   Receive                                                |  Transmit\n \
             face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n    \
             lo: 1000 10 0 0 0 0 0 0 1000 10 0 0 0 0 0 0\n  \
             eth0: 5000 50 0 0 0 0 0 0 2000 20 0 0 0 0 0 0\n";
        assert_eq!(parse_netdev_totals(content), (6000, 3000));
    }

    #[test]
    fn test_disk_usage_percent() {
        let usage = DiskUsage {
            used_bytes: 90,
            available_bytes: 10,
        };
        assert!((usage.used_percent() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_serializes_as_log_record() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let sample = MetricSample::new(
            ts,
            SystemMetrics {
                cpu_percent: 12.5,
                process_count: 42,
                ..SystemMetrics::default()
            },
        );
        let json = serde_json::to_value(sample).unwrap();
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00");
        assert_eq!(json["system_metrics"]["cpu_percent"], 12.5);
        assert_eq!(json["system_metrics"]["process_count"], 42);
        assert!(json["system_metrics"].get("memory_available").is_some());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_read_root_disk_usage() {
        let usage = read_disk_usage(Path::new("/")).unwrap();
        assert!(usage.used_percent() >= 0.0 && usage.used_percent() <= 100.0);
    }
}
