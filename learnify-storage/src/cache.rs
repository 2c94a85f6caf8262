//! TTL cache over a [`KvStore`].
//!
//! Entries are persisted as a JSON envelope `{data, timestamp, ttl}` under
//! `<prefix>_<key>`, with `timestamp` and `ttl` in milliseconds. Expiry is
//! lazy: a read that finds an expired envelope deletes it and reports a
//! miss. There is no size bound and no background sweep.
//!
//! The cache is advisory. Writes never fail the caller; substrate and
//! serialization problems are logged and swallowed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use learnify_core::{to_epoch_millis, Clock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::kv::KvStore;

/// Default key namespace.
pub const DEFAULT_CACHE_PREFIX: &str = "learnify_cache";

/// Default entry lifetime (1 hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Persisted envelope around a cached value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Store time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Lifetime in milliseconds.
    pub ttl: i64,
}

impl<T> CacheEntry<T> {
    /// `now - timestamp <= ttl`
    pub fn is_fresh_at(&self, now_millis: i64) -> bool {
        now_millis.saturating_sub(self.timestamp) <= self.ttl
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that returned a fresh value.
    pub hits: u64,
    /// Reads that found nothing usable (absent, expired or corrupt).
    pub misses: u64,
    /// Entries deleted on read because their TTL had passed.
    pub expired: u64,
    /// Successful writes.
    pub writes: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    writes: AtomicU64,
}

/// Namespaced TTL cache.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    prefix: String,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("prefix", &self.prefix)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Cache {
    /// Create a cache under [`DEFAULT_CACHE_PREFIX`].
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_prefix(store, clock, DEFAULT_CACHE_PREFIX)
    }

    pub fn with_prefix(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            prefix: prefix.into(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Substrate key for a cache key.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key)
    }

    /// Store `value` under `key` for `ttl`.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let entry = CacheEntry {
            data: value,
            timestamp: to_epoch_millis(self.clock.now()),
            ttl: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
        };

        let encoded = match serde_json::to_string(&entry) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        match self.store.write(&self.storage_key(key), &encoded) {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
                debug!(key, ttl_ms = entry.ttl, "Cached value");
            }
            Err(e) => warn!(key, error = %e, "Failed to save to cache"),
        }
    }

    /// Fresh value under `key`, if any. Expired entries are removed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let storage_key = self.storage_key(key);
        let raw = match self.store.read(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.record_miss();
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read from cache");
                self.record_miss();
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable cache entry");
                self.delete(key);
                self.record_miss();
                return None;
            }
        };

        if !entry.is_fresh_at(to_epoch_millis(self.clock.now())) {
            debug!(key, "Cache entry expired");
            self.delete(key);
            self.counters.expired.fetch_add(1, Ordering::Relaxed);
            self.record_miss();
            return None;
        }

        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.data)
    }

    /// Remove `key`. Removing an absent key is a no-op.
    pub fn delete(&self, key: &str) {
        if let Err(e) = self.store.remove(&self.storage_key(key)) {
            warn!(key, error = %e, "Failed to delete from cache");
        }
    }

    /// Remove every entry in this cache's namespace, leaving other keys in
    /// the substrate untouched. Returns the number of removed entries.
    pub fn clear(&self) -> usize {
        let namespace = format!("{}_", self.prefix);
        let keys = match self.store.list_keys(&namespace) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(prefix = %self.prefix, error = %e, "Failed to clear cache");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            match self.store.remove(&key) {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "Failed to remove cache entry"),
            }
        }
        debug!(prefix = %self.prefix, removed, "Cleared cache");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
        }
    }

    fn record_miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;
    use learnify_core::ManualClock;
    use serde_json::json;

    fn fixture() -> (Cache, Arc<MemoryKvStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let cache = Cache::new(store.clone(), clock.clone());
        (cache, store, clock)
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let (cache, _, _) = fixture();
        cache.set("courses_all", &vec!["a", "b"], Duration::from_secs(300));
        let value: Option<Vec<String>> = cache.get("courses_all");
        assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_entry_is_fresh_exactly_at_ttl() {
        let (cache, _, clock) = fixture();
        cache.set("k", &1, Duration::from_secs(10));
        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get::<i32>("k"), Some(1));
    }

    #[test]
    fn test_expired_entry_is_removed_on_read() {
        let (cache, store, clock) = fixture();
        cache.set("k", &1, Duration::from_secs(10));
        clock.advance(Duration::from_millis(10_001));

        assert_eq!(cache.get::<i32>("k"), None);
        assert_eq!(store.read("learnify_cache_k").unwrap(), None);
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_envelope_format() {
        let (cache, store, clock) = fixture();
        cache.set("course_1", &json!({"title": "Rust"}), Duration::from_secs(600));

        let raw = store.read("learnify_cache_course_1").unwrap().unwrap();
        let envelope: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(envelope["data"]["title"], "Rust");
        assert_eq!(envelope["ttl"], 600_000);
        assert_eq!(envelope["timestamp"], to_epoch_millis(clock.now()));
    }

    #[test]
    fn test_corrupt_entry_is_treated_as_miss() {
        let (cache, store, _) = fixture();
        store.write("learnify_cache_bad", "not json").unwrap();
        assert_eq!(cache.get::<i32>("bad"), None);
        assert_eq!(store.read("learnify_cache_bad").unwrap(), None);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (cache, _, _) = fixture();
        cache.set("k", &1, DEFAULT_TTL);
        cache.delete("k");
        cache.delete("k");
        assert_eq!(cache.get::<i32>("k"), None);
    }

    #[test]
    fn test_clear_only_touches_own_namespace() {
        let (cache, store, clock) = fixture();
        let other = Cache::with_prefix(store.clone(), clock, "other");
        store.write("access_token", "abc").unwrap();
        cache.set("a", &1, DEFAULT_TTL);
        cache.set("b", &2, DEFAULT_TTL);
        other.set("a", &3, DEFAULT_TTL);

        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.get::<i32>("a"), None);
        assert_eq!(other.get::<i32>("a"), Some(3));
        assert_eq!(store.read("access_token").unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_stats_hit_rate() {
        let (cache, _, _) = fixture();
        cache.set("k", &1, DEFAULT_TTL);
        let _ = cache.get::<i32>("k");
        let _ = cache.get::<i32>("k");
        let _ = cache.get::<i32>("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 0.001);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_value_visible_until_ttl_elapses(
                ttl_ms in 1u64..86_400_000,
                elapsed_ms in 0u64..172_800_000,
            ) {
                let (cache, _, clock) = fixture();
                cache.set("k", &"v", Duration::from_millis(ttl_ms));
                clock.advance(Duration::from_millis(elapsed_ms));

                let got: Option<String> = cache.get("k");
                prop_assert_eq!(got.is_some(), elapsed_ms <= ttl_ms);
            }
        }
    }
}
