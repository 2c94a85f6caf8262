//! Learnify Storage
//!
//! Persistent key-value substrates and the TTL response cache built on them.
//!
//! - [`KvStore`]: flat string map with prefix listing
//! - [`MemoryKvStore`]: process-local substrate
//! - [`LmdbKvStore`]: on-disk substrate backed by LMDB
//! - [`Cache`]: namespaced TTL cache with lazy expiry

pub mod cache;
pub mod kv;
pub mod lmdb;

pub use cache::{Cache, CacheEntry, CacheStats, DEFAULT_CACHE_PREFIX, DEFAULT_TTL};
pub use kv::{KvStore, MemoryKvStore};
pub use lmdb::{LmdbKvStore, LmdbStoreError};
