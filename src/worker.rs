//! Periodic background worker with an explicit start/stop lifecycle.
//!
//! A worker is either Stopped or Running. `start` spawns one OS thread that
//! runs the task, then waits for the interval on a stop channel; `stop` raises
//! the stop flag, wakes the thread and joins it, so the in-flight iteration
//! always completes before `stop` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

struct Running {
    stop_flag: Arc<AtomicBool>,
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Named periodic background thread.
pub struct PeriodicWorker {
    name: String,
    running: Mutex<Option<Running>>,
}

impl PeriodicWorker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts the loop. Returns `false` (and does nothing) if already running.
    pub fn start<F>(&self, interval: Duration, mut task: F) -> std::io::Result<bool>
    where
        F: FnMut() + Send + 'static,
    {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            debug!(worker = %self.name, "Start requested while already running");
            return Ok(false);
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let flag = stop_flag.clone();
        let name = self.name.clone();

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                loop {
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    task();
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(worker = %name, "Worker loop exited");
            })?;

        *running = Some(Running {
            stop_flag,
            stop_tx,
            handle,
        });
        info!(worker = %self.name, interval_secs = interval.as_secs_f64(), "Worker started");
        Ok(true)
    }

    /// Stops the loop and waits for it to exit. Returns `false` if it was not
    /// running.
    pub fn stop(&self) -> bool {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let Some(running) = running else {
            return false;
        };

        running.stop_flag.store(true, Ordering::Release);
        // The receiver may already be gone if the loop exited on its own.
        let _ = running.stop_tx.send(());
        if running.handle.join().is_err() {
            error!(worker = %self.name, "Worker thread panicked");
        }
        info!(worker = %self.name, "Worker stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl Drop for PeriodicWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_start_runs_task_immediately() {
        let worker = PeriodicWorker::new("test-immediate");
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = ticks.clone();
        assert!(worker
            .start(Duration::from_secs(3600), move || {
                t.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap());

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while ticks.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        // The long interval is interrupted by stop, which then joins.
        let stop_started = std::time::Instant::now();
        assert!(worker.stop());
        assert!(stop_started.elapsed() < Duration::from_secs(5));
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_double_start_is_noop() {
        let worker = PeriodicWorker::new("test-double");
        assert!(worker.start(Duration::from_secs(3600), || {}).unwrap());
        assert!(!worker.start(Duration::from_secs(3600), || {}).unwrap());
        assert!(worker.is_running());
        assert!(worker.stop());
        assert!(!worker.is_running());
        assert!(!worker.stop());
    }

    #[test]
    fn test_restart_after_stop() {
        let worker = PeriodicWorker::new("test-restart");
        assert!(worker.start(Duration::from_secs(3600), || {}).unwrap());
        worker.stop();
        assert!(worker.start(Duration::from_secs(3600), || {}).unwrap());
        worker.stop();
    }

    #[test]
    fn test_repeats_on_interval() {
        let worker = PeriodicWorker::new("test-repeat");
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = ticks.clone();
        worker
            .start(Duration::from_millis(5), move || {
                t.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while ticks.load(Ordering::SeqCst) < 3 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        worker.stop();
        assert!(ticks.load(Ordering::SeqCst) >= 3);
    }
}
