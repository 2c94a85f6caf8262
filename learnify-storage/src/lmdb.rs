//! LMDB-backed key-value substrate.
//!
//! Uses the heed crate (Rust bindings for LMDB) to give the cache an on-disk
//! home that survives restarts. Keys and values are stored as UTF-8 bytes in
//! a single unnamed database.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions:
//! - Read transactions for `read` and `list_keys`
//! - Write transactions for `write` and `remove`

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use learnify_core::{StorageError, StorageResult};

use crate::kv::KvStore;

/// Error type for LMDB substrate setup.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for StorageError {
    fn from(e: LmdbStoreError) -> Self {
        StorageError::Backend {
            reason: e.to_string(),
        }
    }
}

fn txn_error(e: heed::Error) -> StorageError {
    LmdbStoreError::Transaction(e.to_string()).into()
}

/// LMDB key-value substrate.
///
/// # Example
///
/// ```ignore
/// let store = LmdbKvStore::open("/var/lib/learnify/cache", 16)?;
/// store.write("learnify_cache_courses_all", "{...}")?;
/// ```
pub struct LmdbKvStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbKvStore {
    /// Open (or create) the store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the map in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per directory by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }
}

impl KvStore for LmdbKvStore {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        match self.db.get(&rtxn, key.as_bytes()).map_err(txn_error)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| StorageError::Serialization {
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), value.as_bytes())
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)
    }

    fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let prefix = prefix.as_bytes();

        let mut keys = Vec::new();
        for result in self.db.prefix_iter(&rtxn, prefix).map_err(txn_error)? {
            let (key, _) = result.map_err(txn_error)?;
            if let Ok(key) = std::str::from_utf8(key) {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbKvStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbKvStore::open(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    #[test]
    fn test_lmdb_read_write_remove() {
        let (store, _dir) = create_test_store();

        assert_eq!(store.read("k").unwrap(), None);
        store.write("k", "value").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("value"));

        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.read("k").unwrap(), None);
    }

    #[test]
    fn test_lmdb_list_keys_by_prefix() {
        let (store, _dir) = create_test_store();
        store.write("learnify_cache_courses_all", "[]").unwrap();
        store.write("learnify_cache_course_1", "{}").unwrap();
        store.write("access_token", "abc").unwrap();

        let keys = store.list_keys("learnify_cache_").unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with("learnify_cache_")));
    }

    #[test]
    fn test_lmdb_prefix_scan_stops_at_neighbours() {
        let (store, _dir) = create_test_store();
        for key in [
            "learnify_cache",
            "learnify_cache_",
            "learnify_cache_a",
            "learnify_cache_zz",
            "learnify_cachf",
            "learnify_repetition",
        ] {
            store.write(key, "v").unwrap();
        }

        let keys = store.list_keys("learnify_cache_").unwrap();
        assert_eq!(
            keys,
            vec!["learnify_cache_", "learnify_cache_a", "learnify_cache_zz"]
        );
        assert_eq!(store.list_keys("").unwrap().len(), 6);
        assert!(store.list_keys("nothing_").unwrap().is_empty());
    }

    #[test]
    fn test_lmdb_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = LmdbKvStore::open(temp_dir.path(), 10).unwrap();
            store.write("durable", "yes").unwrap();
        }
        let store = LmdbKvStore::open(temp_dir.path(), 10).unwrap();
        assert_eq!(store.read("durable").unwrap().as_deref(), Some("yes"));
    }
}
