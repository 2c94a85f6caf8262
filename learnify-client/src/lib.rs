//! Learnify Client
//!
//! Resilient access to the Learnify REST backend.
//!
//! ```text
//! LearnifyService ──▶ ResilientRequestExecutor ──▶ with_retry ──▶ CircuitBreaker ──▶ Transport
//!        │                                                         (per class)
//!        └──▶ Cache (store on success, fall back on failure)
//! ```
//!
//! Everything is constructed explicitly; [`build_service`] wires the default
//! composition from a [`ClientConfig`].

pub mod auth;
pub mod breaker;
pub mod config;
pub mod constants;
pub mod executor;
pub mod retry;
pub mod service;
pub mod telemetry;
pub mod transport;

use std::sync::Arc;

use learnify_core::{Clock, LearnifyError, LearnifyResult, RequestClass, StorageError};
use learnify_storage::{Cache, KvStore, LmdbKvStore, MemoryKvStore};

pub use auth::{StaticTokenProvider, StoredTokenProvider, TokenProvider};
pub use breaker::{BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig};
pub use config::{ClientConfig, ConfigError};
pub use executor::ResilientRequestExecutor;
pub use retry::{is_retryable, with_retry, RetryOptions, RetryOverrides};
pub use service::LearnifyService;
pub use transport::{HttpResponse, HttpTransport, Method, Transport};

/// Open the substrate `config` asks for: LMDB at `cache_path`, or memory.
pub fn open_store(config: &ClientConfig) -> LearnifyResult<Arc<dyn KvStore>> {
    match &config.cache_path {
        Some(path) => {
            let store = LmdbKvStore::open(path, config.cache_map_size_mb)
                .map_err(StorageError::from)?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryKvStore::new())),
    }
}

/// Wire breakers, retry, the HTTP transport and the cache into a service.
///
/// A token in `[auth]` is used as-is; otherwise tokens live in `store`.
pub fn build_service(
    config: &ClientConfig,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
) -> LearnifyResult<LearnifyService> {
    let stored_tokens = Arc::new(StoredTokenProvider::new(store.clone()));
    let tokens: Arc<dyn TokenProvider> = match &config.auth.token {
        Some(token) => Arc::new(StaticTokenProvider::new(token.clone())),
        None => stored_tokens.clone(),
    };

    let transport = HttpTransport::new(config.request_timeout(), Some(tokens)).map_err(|e| {
        LearnifyError::Request(learnify_core::RequestError::transport(None, e.to_string()))
    })?;

    let breakers = BreakerRegistry::with_configs(
        config.breaker_config(RequestClass::Read),
        config.breaker_config(RequestClass::Write),
        config.breaker_config(RequestClass::Default),
        clock.clone(),
    );

    let executor = ResilientRequestExecutor::new(
        Arc::new(transport),
        breakers,
        config.api_base_url.clone(),
        config.retry_options(),
    );
    let cache = Cache::with_prefix(store, clock, config.cache_prefix.clone());

    let service = LearnifyService::new(executor, cache);
    Ok(match config.auth.token {
        Some(_) => service,
        None => service.with_token_store(stored_tokens),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnify_core::ManualClock;

    #[test]
    fn test_open_store_uses_lmdb_when_path_set() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            cache_path: Some(dir.path().to_path_buf()),
            ..ClientConfig::default()
        };

        let store = open_store(&config).unwrap();
        store.write("learnify_cache_marker", "1").unwrap();

        assert_eq!(store.read("learnify_cache_marker").unwrap().as_deref(), Some("1"));
        assert!(dir.path().join("data.mdb").exists());
    }

    #[test]
    fn test_build_service_applies_config() {
        let mut config = ClientConfig::default();
        config.api_base_url = "https://learnify.example.com/api/".to_string();
        config.breaker.write.failure_threshold = 7;

        let store = open_store(&config).unwrap();
        let service =
            build_service(&config, store, Arc::new(ManualClock::starting_now())).unwrap();

        assert_eq!(service.executor().base_url(), "https://learnify.example.com/api");
        assert_eq!(
            service
                .executor()
                .breakers()
                .get(RequestClass::Write)
                .config()
                .failure_threshold,
            7
        );
        assert_eq!(service.cache().prefix(), "learnify_cache");
    }
}
