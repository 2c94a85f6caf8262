//! Access-token providers.
//!
//! The transport asks a [`TokenProvider`] for the bearer token on every
//! request and tells it to forget its tokens when the backend answers 401.

use std::sync::{Arc, RwLock};

use learnify_core::{StorageResult, TokenResponse};
use learnify_storage::KvStore;
use tracing::{debug, warn};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

pub trait TokenProvider: Send + Sync {
    fn current_token(&self) -> Option<String>;
    fn clear_tokens(&self);
}

/// A fixed token, e.g. from the config file. Cleared in memory only.
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    token: RwLock<Option<String>>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn current_token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn clear_tokens(&self) {
        if let Ok(mut token) = self.token.write() {
            *token = None;
        }
    }
}

/// Tokens kept in a [`KvStore`] under `access_token` and `refresh_token`.
#[derive(Clone)]
pub struct StoredTokenProvider {
    store: Arc<dyn KvStore>,
}

impl StoredTokenProvider {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn save_tokens(&self, tokens: &TokenResponse) -> StorageResult<()> {
        self.store.write(ACCESS_TOKEN_KEY, &tokens.access_token)?;
        self.store.write(REFRESH_TOKEN_KEY, &tokens.refresh_token)?;
        debug!("Saved auth tokens");
        Ok(())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_token().is_some()
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.read(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read token");
                None
            }
        }
    }
}

impl std::fmt::Debug for StoredTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokenProvider")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl TokenProvider for StoredTokenProvider {
    fn current_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    fn clear_tokens(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to clear token");
            }
        }
        debug!("Cleared auth tokens");
    }
}
