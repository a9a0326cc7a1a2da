//! Integration tests for the TTL result cache.
//!
//! Time is driven by a `ManualClock`, so expiry is exact and no test sleeps.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use storefront_perf::{Housekeeper, ManualClock, TtlCache};

fn cache_with_clock() -> (Arc<TtlCache<String>>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let cache = Arc::new(TtlCache::new(Duration::from_secs(300), clock.clone()));
    (cache, clock)
}

#[test]
fn test_account_status_expires_between_reads() {
    let (cache, clock) = cache_with_clock();

    cache.set("acct:7", r#"{"status":"active"}"#.to_string(), Duration::from_secs(5));

    clock.set_offset(Duration::from_secs(4));
    assert_eq!(cache.get("acct:7").as_deref(), Some(r#"{"status":"active"}"#));

    clock.set_offset(Duration::from_secs(6));
    assert_eq!(cache.get("acct:7"), None);
    // The expired read also evicted the entry.
    assert!(cache.is_empty());
}

#[test]
fn test_expired_key_visible_again_after_fresh_set() {
    let (cache, clock) = cache_with_clock();

    cache.set("plans", "v1".to_string(), Duration::from_secs(2));
    clock.advance(Duration::from_secs(3));
    assert_eq!(cache.get("plans"), None);

    cache.set("plans", "v2".to_string(), Duration::from_secs(2));
    assert_eq!(cache.get("plans").as_deref(), Some("v2"));
}

#[test]
fn test_expiry_is_exclusive_at_deadline() {
    let (cache, clock) = cache_with_clock();

    cache.set("k", "v".to_string(), Duration::from_secs(5));
    clock.advance(Duration::from_secs(5));
    assert_eq!(cache.get("k"), None);
}

#[test]
fn test_overwrite_replaces_value_and_ttl() {
    let (cache, clock) = cache_with_clock();

    cache.set("k", "long".to_string(), Duration::from_secs(60));
    cache.set("k", "short".to_string(), Duration::from_secs(1));

    assert_eq!(cache.get("k").as_deref(), Some("short"));
    clock.advance(Duration::from_secs(2));
    assert_eq!(cache.get("k"), None);
}

#[test]
fn test_clear_and_clear_all() {
    let (cache, _) = cache_with_clock();

    cache.insert("a", "1".to_string());
    cache.insert("b", "2".to_string());
    cache.clear("a");
    cache.clear("missing");
    assert_eq!(cache.keys(), vec!["b".to_string()]);

    cache.clear_all();
    assert!(cache.is_empty());
}

#[test]
fn test_stats_count_hits_and_misses() {
    let (cache, _) = cache_with_clock();

    cache.insert("a", "1".to_string());
    cache.get("a");
    cache.get("a");
    cache.get("b");

    let stats = cache.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
}

#[test]
fn test_janitor_reclaims_unread_entries() {
    let (cache, clock) = cache_with_clock();

    for i in 0..10 {
        cache.set(format!("k{i}"), i.to_string(), Duration::from_secs(1));
    }
    cache.set("keep", "x".to_string(), Duration::from_secs(60));
    clock.advance(Duration::from_secs(2));

    let keeper = Housekeeper::new(Some(cache.clone()), None);
    assert_eq!(keeper.sweep().purged_entries, 10);
    assert_eq!(cache.keys(), vec!["keep".to_string()]);
}

#[test]
fn test_concurrent_writers_and_readers() {
    let (cache, _) = cache_with_clock();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("t{t}:{i}");
                    cache.set(key.clone(), format!("{t}-{i}"), Duration::from_secs(60));
                    assert_eq!(cache.get(&key), Some(format!("{t}-{i}")));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.len(), 8 * 200);
}
