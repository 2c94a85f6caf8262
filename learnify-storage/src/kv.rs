//! Persistent key-value substrate.
//!
//! The cache and the token store sit on top of a [`KvStore`]: a flat
//! string-to-string map with prefix listing, the same contract browser local
//! storage or an on-disk KV file offers. Implementations must make `remove`
//! idempotent.

use std::collections::BTreeMap;
use std::sync::RwLock;

use learnify_core::{StorageError, StorageResult};

/// String key-value substrate.
pub trait KvStore: Send + Sync {
    /// Read a value, `None` when the key is absent.
    fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Insert or overwrite a value.
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a key. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// All keys starting with `prefix`, in ascending order.
    fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// In-memory substrate, used when no cache path is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys across all prefixes.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKvStore {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_read_write_remove() {
        let store = MemoryKvStore::new();
        assert_eq!(store.read("a").unwrap(), None);

        store.write("a", "1").unwrap();
        assert_eq!(store.read("a").unwrap().as_deref(), Some("1"));

        store.write("a", "2").unwrap();
        assert_eq!(store.read("a").unwrap().as_deref(), Some("2"));

        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.read("a").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_list_keys_by_prefix() {
        let store = MemoryKvStore::new();
        store.write("learnify_cache_b", "x").unwrap();
        store.write("learnify_cache_a", "x").unwrap();
        store.write("learnify_cachex", "x").unwrap();
        store.write("access_token", "x").unwrap();

        let keys = store.list_keys("learnify_cache_").unwrap();
        assert_eq!(keys, vec!["learnify_cache_a", "learnify_cache_b"]);
        assert_eq!(store.list_keys("").unwrap().len(), 4);
    }
}
