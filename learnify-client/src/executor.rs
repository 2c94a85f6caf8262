//! Resilient request executor.
//!
//! Each request picks a breaker by class and runs
//! `with_retry(|| breaker.execute(|| transport.perform(..)))`. Retries sit
//! outside the breaker, so every attempt is gated separately and a breaker
//! that opens mid-sequence ends the remaining attempts without touching the
//! network.

use std::sync::Arc;

use learnify_core::{RequestClass, RequestError};
use serde_json::Value;
use tracing::debug;

use crate::breaker::BreakerRegistry;
use crate::retry::{with_retry, RetryOptions, RetryOverrides};
use crate::transport::{HttpResponse, Method, Transport};

#[derive(Clone)]
pub struct ResilientRequestExecutor {
    transport: Arc<dyn Transport>,
    breakers: BreakerRegistry,
    base_url: String,
    retry: RetryOptions,
}

impl ResilientRequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        breakers: BreakerRegistry,
        base_url: impl Into<String>,
        retry: RetryOptions,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            transport,
            breakers,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_options(&self) -> &RetryOptions {
        &self.retry
    }

    /// Absolute URLs pass through; paths are joined to the base URL.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// [`url_for`](Self::url_for) with `query` appended, each value
    /// percent-encoded.
    pub fn url_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<String, RequestError> {
        let mut url = reqwest::Url::parse(&self.url_for(path))
            .map_err(|e| RequestError::transport(None, format!("Invalid URL for {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }

    /// Issue a request through retry and the class breaker.
    ///
    /// `class` defaults to [`RequestClass::for_method`]; `overrides` are merged
    /// over the executor's retry options for this call only.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        class: Option<RequestClass>,
        overrides: Option<&RetryOverrides>,
    ) -> Result<HttpResponse, RequestError> {
        let class = class.unwrap_or_else(|| RequestClass::for_method(method.as_str()));
        let breaker = self.breakers.get(class);
        let url = self.url_for(path);
        let options = match overrides {
            Some(overrides) => self.retry.merged(overrides),
            None => self.retry.clone(),
        };

        debug!(%method, %class, url = %url, "Executing request");
        with_retry(
            || breaker.execute(|| self.transport.perform(method, &url, body)),
            &options,
        )
        .await
    }

    pub async fn get(
        &self,
        path: &str,
        overrides: Option<&RetryOverrides>,
    ) -> Result<HttpResponse, RequestError> {
        self.request(Method::Get, path, None, None, overrides).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        overrides: Option<&RetryOverrides>,
    ) -> Result<HttpResponse, RequestError> {
        self.request(Method::Post, path, body, None, overrides).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: Option<&Value>,
        overrides: Option<&RetryOverrides>,
    ) -> Result<HttpResponse, RequestError> {
        self.request(Method::Put, path, body, None, overrides).await
    }

    pub async fn delete(
        &self,
        path: &str,
        overrides: Option<&RetryOverrides>,
    ) -> Result<HttpResponse, RequestError> {
        self.request(Method::Delete, path, None, None, overrides).await
    }
}

impl std::fmt::Debug for ResilientRequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientRequestExecutor")
            .field("base_url", &self.base_url)
            .field("breakers", &self.breakers)
            .field("retry", &self.retry)
            .finish()
    }
}
