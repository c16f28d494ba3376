//! Response cache for safe (GET) requests.
//!
//! [`ResponseCache`] maps a [`CacheFingerprint`] to the JSON body of a
//! previously successful upstream response.
//!
//! # Expiry and eviction
//!
//! - Entries carry their own TTL and are expired lazily: a `get` past the
//!   deadline removes the entry and counts a miss. There is no background
//!   sweeper, so expired entries occupy capacity until read or evicted.
//! - When the store is full, the entry inserted longest ago is evicted
//!   (insertion order, not access order). Re-inserting a key moves it to
//!   the back of the queue and resets its insertion time.
//!
//! # Concurrency
//!
//! The store sits behind a mutex that is held only for map operations,
//! never across an await. Hit/miss counters are atomics. Two concurrent
//! misses for the same fingerprint both reach the network and the last
//! `put` wins.

mod fingerprint;

pub use fingerprint::{CacheFingerprint, SEPARATOR};

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::retry::round2;
use crate::telemetry;

/// Configuration for the response cache.
///
/// ```rust
/// # use bifrost::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_size(500)
///     .ttl(Duration::from_secs(60));
/// assert!(config.enabled);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Default: true.
    pub enabled: bool,
    /// Time-to-live for new entries. Default: 5 minutes.
    pub ttl: Duration,
    /// Maximum number of entries. Default: 1,000.
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(5 * 60),
            max_size: 1_000,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// A config with caching switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }
}

/// Snapshot of cache counters and occupancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Percentage of lookups that hit, rounded to two decimals.
    pub hit_rate: f64,
    pub size: usize,
    pub max_size: usize,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    inserted_at: Instant,
    ttl: Duration,
    /// Position in the insertion queue.
    seq: u64,
}

impl CacheEntry {
    /// A deadline past the clock's range never expires.
    fn is_expired(&self, now: Instant) -> bool {
        self.inserted_at
            .checked_add(self.ttl)
            .is_some_and(|deadline| now >= deadline)
    }
}

#[derive(Debug, Default)]
struct Store {
    entries: HashMap<CacheFingerprint, CacheEntry>,
    order: BTreeMap<u64, CacheFingerprint>,
    next_seq: u64,
}

impl Store {
    fn remove(&mut self, key: &CacheFingerprint) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.seq);
                true
            }
            None => false,
        }
    }

    fn pop_oldest(&mut self) -> Option<CacheFingerprint> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// In-memory, size-bounded TTL cache for upstream response bodies.
#[derive(Debug)]
pub struct ResponseCache {
    config: CacheConfig,
    store: Mutex<Store>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        debug!(
            enabled = config.enabled,
            ttl_ms = config.ttl.as_millis() as u64,
            max_size = config.max_size,
            "response cache initialized"
        );
        Self {
            config,
            store: Mutex::new(Store::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a live entry.
    ///
    /// Returns `None` on miss or expiry; an expired entry is removed. With
    /// caching disabled this always returns `None` and counts nothing.
    pub fn get(&self, key: &CacheFingerprint) -> Option<serde_json::Value> {
        if !self.config.enabled {
            return None;
        }

        let now = Instant::now();
        let found = {
            let mut store = self.store();
            let lookup = store
                .entries
                .get(key)
                .map(|entry| (entry.is_expired(now), entry.value.clone()));
            match lookup {
                Some((false, value)) => Some(value),
                Some((true, _)) => {
                    store.remove(key);
                    None
                }
                None => None,
            }
        };

        let adapter = key.adapter().to_owned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "adapter" => adapter).increment(1);
            debug!(key = %key.log_key(), "cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "adapter" => adapter).increment(1);
            debug!(key = %key.log_key(), "cache miss");
        }
        found
    }

    /// Insert with the configured TTL.
    pub fn put(&self, key: CacheFingerprint, value: serde_json::Value) {
        self.put_with_ttl(key, value, self.config.ttl);
    }

    /// Insert with an explicit TTL, evicting the oldest insertion when full.
    pub fn put_with_ttl(&self, key: CacheFingerprint, value: serde_json::Value, ttl: Duration) {
        if !self.config.enabled || self.config.max_size == 0 {
            return;
        }

        let log_key = key.log_key();
        let evicted = {
            let mut store = self.store();
            let replaced = store.remove(&key);
            let evicted = if !replaced && store.entries.len() >= self.config.max_size {
                store.pop_oldest()
            } else {
                None
            };

            let seq = store.next_seq;
            store.next_seq += 1;
            store.order.insert(seq, key.clone());
            store.entries.insert(
                key,
                CacheEntry {
                    value,
                    inserted_at: Instant::now(),
                    ttl,
                    seq,
                },
            );
            evicted
        };

        if let Some(old) = evicted {
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
            debug!(key = %old.log_key(), "evicted oldest cache entry");
        }
        debug!(key = %log_key, ttl_ms = ttl.as_millis() as u64, "cached response");
    }

    /// Remove one entry. Absent keys are ignored.
    pub fn invalidate(&self, key: &CacheFingerprint) {
        if !self.config.enabled {
            return;
        }
        if self.store().remove(key) {
            debug!(key = %key.log_key(), "invalidated cache entry");
        }
    }

    /// Remove every entry derived for `adapter`. Returns how many were removed.
    pub fn invalidate_adapter(&self, adapter: &str) -> usize {
        if !self.config.enabled {
            return 0;
        }
        let mut store = self.store();
        let doomed: Vec<CacheFingerprint> = store
            .entries
            .keys()
            .filter(|key| key.belongs_to(adapter))
            .cloned()
            .collect();
        for key in &doomed {
            store.remove(key);
        }
        drop(store);

        debug!(adapter, removed = doomed.len(), "invalidated adapter cache entries");
        doomed.len()
    }

    /// Drop all entries and zero the hit/miss counters.
    pub fn clear(&self) {
        {
            let mut store = self.store();
            store.entries.clear();
            store.order.clear();
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        info!("response cache cleared");
    }

    /// Whether a response to `method` with `status` may be cached.
    ///
    /// Only GET (any case) with a 200–206 status qualifies, and only while
    /// caching is enabled.
    pub fn should_cache(&self, method: &str, status: u16) -> bool {
        self.config.enabled && method.eq_ignore_ascii_case("GET") && (200..=206).contains(&status)
    }

    /// Number of stored entries, expired-but-unread ones included.
    pub fn len(&self) -> usize {
        self.store().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            hit_rate: round2(hit_rate),
            size: self.len(),
            max_size: self.config.max_size,
            enabled: self.config.enabled,
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
