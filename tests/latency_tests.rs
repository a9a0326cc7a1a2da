//! Integration tests for per-operation latency recording.

use std::sync::Arc;
use std::time::Duration;
use storefront_perf::latency::DEFAULT_MAX_SAMPLES;
use storefront_perf::{LatencyRecorder, ManualClock};

fn recorder() -> (LatencyRecorder, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (LatencyRecorder::new(DEFAULT_MAX_SAMPLES, clock.clone()), clock)
}

#[test]
fn test_window_never_exceeds_cap() {
    let (rec, _) = recorder();

    // The first sample is the slowest and must be evicted.
    rec.record("checkout", 5000.0);
    for i in 0..DEFAULT_MAX_SAMPLES + 249 {
        rec.record("checkout", (i % 10) as f64);
    }

    let stats = rec.stats("checkout");
    assert_eq!(stats.count, DEFAULT_MAX_SAMPLES);
    assert_eq!(stats.max_ms, 9.0);
    assert_eq!(stats.total, (DEFAULT_MAX_SAMPLES + 250) as u64);
}

#[test]
fn test_operations_are_tracked_separately() {
    let (rec, _) = recorder();

    rec.record("browse", 10.0);
    rec.record("purchase", 200.0);
    rec.record("purchase", 400.0);

    assert_eq!(rec.stats("browse").count, 1);
    let purchase = rec.stats("purchase");
    assert_eq!(purchase.count, 2);
    assert!((purchase.average_ms - 300.0).abs() < 1e-9);
    assert_eq!(purchase.max_ms, 400.0);
}

#[test]
fn test_timed_failure_is_recorded_then_returned() {
    let (rec, clock) = recorder();

    let result: Result<u32, String> = rec.time("purchase", || {
        clock.advance(Duration::from_millis(120));
        Err("payment gateway timeout".to_string())
    });

    assert_eq!(result, Err("payment gateway timeout".to_string()));
    let stats = rec.stats("purchase");
    assert_eq!(stats.count, 1);
    assert!((stats.average_ms - 120.0).abs() < 1e-6);
}

#[test]
fn test_unknown_operation_is_zero() {
    let (rec, _) = recorder();
    let stats = rec.stats("never-called");
    assert_eq!(stats.count, 0);
    assert_eq!(stats.average_ms, 0.0);
    assert_eq!(stats.max_ms, 0.0);
}
