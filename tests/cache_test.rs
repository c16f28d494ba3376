//! Tests for [`ResponseCache`]: insertion-ordered, size-bounded TTL cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bifrost::cache::{CacheConfig, CacheFingerprint, ResponseCache};
use serde_json::json;

fn key(adapter: &str, path: &str) -> CacheFingerprint {
    CacheFingerprint::new(adapter, "GET", path, &BTreeMap::new(), None).unwrap()
}

// =========================================================================
// CacheConfig
// =========================================================================

#[test]
fn cache_config_defaults() {
    let config = CacheConfig::default();
    assert!(config.enabled);
    assert_eq!(config.max_size, 1_000);
    assert_eq!(config.ttl, Duration::from_secs(300));
}

#[test]
fn cache_config_builder() {
    let config = CacheConfig::new()
        .max_size(500)
        .ttl(Duration::from_secs(60))
        .enabled(false);
    assert_eq!(config.max_size, 500);
    assert_eq!(config.ttl, Duration::from_secs(60));
    assert!(!config.enabled);
}

// =========================================================================
// Lookup and expiry
// =========================================================================

#[test]
fn miss_then_hit() {
    let cache = ResponseCache::default();
    let k = key("svc", "/ping");

    assert!(cache.get(&k).is_none());
    cache.put(k.clone(), json!({"ok": true}));
    assert_eq!(cache.get(&k), Some(json!({"ok": true})));

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 50.0);
    assert_eq!(stats.size, 1);
}

#[tokio::test(start_paused = true)]
async fn entry_expires_after_ttl() {
    let cache = ResponseCache::new(CacheConfig::new().ttl(Duration::from_millis(1000)));
    let k = key("svc", "/ping");
    cache.put(k.clone(), json!("pong"));

    assert_eq!(cache.get(&k), Some(json!("pong")));

    tokio::time::advance(Duration::from_millis(1100)).await;

    assert!(cache.get(&k).is_none());
    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 0, "expired entry is removed on read");
}

#[tokio::test(start_paused = true)]
async fn per_entry_ttl_overrides_default() {
    let cache = ResponseCache::new(CacheConfig::new().ttl(Duration::from_secs(60)));
    let short = key("svc", "/short");
    let long = key("svc", "/long");
    cache.put_with_ttl(short.clone(), json!(1), Duration::from_millis(10));
    cache.put(long.clone(), json!(2));

    tokio::time::advance(Duration::from_millis(20)).await;

    assert!(cache.get(&short).is_none());
    assert_eq!(cache.get(&long), Some(json!(2)));
}

#[tokio::test(start_paused = true)]
async fn reinsert_resets_insertion_time() {
    let cache = ResponseCache::new(CacheConfig::new().ttl(Duration::from_millis(100)));
    let k = key("svc", "/x");
    cache.put(k.clone(), json!(1));

    tokio::time::advance(Duration::from_millis(80)).await;
    cache.put(k.clone(), json!(2));
    tokio::time::advance(Duration::from_millis(80)).await;

    assert_eq!(cache.get(&k), Some(json!(2)));
}

#[tokio::test(start_paused = true)]
async fn unbounded_ttl_never_expires() {
    let cache = ResponseCache::new(CacheConfig::new().ttl(Duration::MAX));
    let k = key("svc", "/forever");
    cache.put(k.clone(), json!(1));

    assert_eq!(cache.get(&k), Some(json!(1)));
    tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
    assert_eq!(cache.get(&k), Some(json!(1)));

    let half = key("svc", "/half");
    cache.put_with_ttl(half.clone(), json!(2), Duration::from_secs(u64::MAX / 2));
    assert_eq!(cache.get(&half), Some(json!(2)));
    assert_eq!(cache.stats().hits, 3);
}

// =========================================================================
// Eviction
// =========================================================================

#[test]
fn evicts_first_inserted_when_full() {
    let n = 3;
    let cache = ResponseCache::new(CacheConfig::new().max_size(n));
    for i in 0..=n {
        cache.put(key("svc", &format!("/{i}")), json!(i));
    }

    assert_eq!(cache.len(), n);
    assert!(cache.get(&key("svc", "/0")).is_none());
    for i in 1..=n {
        assert_eq!(cache.get(&key("svc", &format!("/{i}"))), Some(json!(i)));
    }
}

#[test]
fn eviction_ignores_access_order() {
    let cache = ResponseCache::new(CacheConfig::new().max_size(2));
    cache.put(key("svc", "/a"), json!("a"));
    cache.put(key("svc", "/b"), json!("b"));

    // Reading /a does not protect it
    assert!(cache.get(&key("svc", "/a")).is_some());
    cache.put(key("svc", "/c"), json!("c"));

    assert!(cache.get(&key("svc", "/a")).is_none());
    assert!(cache.get(&key("svc", "/b")).is_some());
}

#[test]
fn overwriting_a_key_does_not_evict() {
    let cache = ResponseCache::new(CacheConfig::new().max_size(2));
    cache.put(key("svc", "/a"), json!(1));
    cache.put(key("svc", "/b"), json!(2));
    cache.put(key("svc", "/a"), json!(3));

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&key("svc", "/a")), Some(json!(3)));
    assert_eq!(cache.get(&key("svc", "/b")), Some(json!(2)));
}

// =========================================================================
// Invalidation
// =========================================================================

#[test]
fn invalidate_single_entry() {
    let cache = ResponseCache::default();
    let k = key("svc", "/x");
    cache.put(k.clone(), json!(1));
    cache.invalidate(&k);
    cache.invalidate(&k); // absent is fine
    assert!(cache.is_empty());
}

#[test]
fn invalidate_by_adapter_leaves_others() {
    let cache = ResponseCache::default();
    cache.put(key("svc", "/a"), json!(1));
    cache.put(key("svc", "/b"), json!(2));
    cache.put(key("svc2", "/a"), json!(3));
    cache.put(key("other", "/a"), json!(4));

    assert_eq!(cache.invalidate_adapter("svc"), 2);
    assert_eq!(cache.len(), 2);
    assert!(cache.get(&key("svc2", "/a")).is_some());
    assert!(cache.get(&key("other", "/a")).is_some());
}

#[test]
fn clear_drops_entries_and_counters() {
    let cache = ResponseCache::default();
    let k = key("svc", "/x");
    cache.get(&k);
    cache.put(k.clone(), json!(1));
    cache.get(&k);

    cache.clear();

    let stats = cache.stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.hit_rate, 0.0);
    assert_eq!(stats.size, 0);
}

// =========================================================================
// Gating and disabled cache
// =========================================================================

#[test]
fn should_cache_gating() {
    let cache = ResponseCache::default();
    assert!(cache.should_cache("GET", 200));
    assert!(cache.should_cache("get", 206));
    assert!(cache.should_cache("GET", 201));
    assert!(!cache.should_cache("POST", 200));
    assert!(!cache.should_cache("GET", 404));
    assert!(!cache.should_cache("GET", 207));
}

#[test]
fn disabled_cache_is_inert() {
    let cache = ResponseCache::new(CacheConfig::disabled());
    let k = key("svc", "/x");
    cache.put(k.clone(), json!(1));

    assert!(cache.get(&k).is_none());
    assert!(!cache.should_cache("GET", 200));

    let stats = cache.stats();
    assert!(!stats.enabled);
    assert_eq!(stats.size, 0);
    assert_eq!(stats.misses, 0, "disabled cache does not count lookups");
}

#[test]
fn stats_serialize_camel_case() {
    let cache = ResponseCache::new(CacheConfig::new().max_size(7));
    let json = serde_json::to_value(cache.stats()).unwrap();
    assert_eq!(json["maxSize"], 7);
    assert_eq!(json["hitRate"], 0.0);
    assert_eq!(json["enabled"], true);
}

// =========================================================================
// Concurrency
// =========================================================================

#[test]
fn concurrent_access_keeps_counters_and_bound() {
    let cache = Arc::new(ResponseCache::new(CacheConfig::new().max_size(50)));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    let k = key("svc", &format!("/{t}/{i}"));
                    cache.put(k.clone(), json!(i));
                    cache.get(&k);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 800);
    assert!(stats.size <= 50);
}
