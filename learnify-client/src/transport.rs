//! HTTP transport.
//!
//! [`Transport`] is the single seam to the network. [`HttpTransport`] is the
//! reqwest implementation; tests script their own. Every failure is decoded
//! here, once, into a [`RequestError`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use learnify_core::RequestError;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::TokenProvider;

/// HTTP verbs the client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A successful (2xx) response with its decoded JSON body.
/// Empty bodies decode to `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request. Non-2xx answers are errors.
    async fn perform(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<HttpResponse, RequestError>;
}

/// reqwest-backed transport with a per-request timeout and bearer auth.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl HttpTransport {
    pub fn new(
        timeout: Duration,
        tokens: Option<Arc<dyn TokenProvider>>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            timeout,
            tokens,
        })
    }

    fn decode_transport_error(&self, err: reqwest::Error) -> RequestError {
        if err.is_timeout() {
            return RequestError::transport(
                Some("ETIMEDOUT"),
                format!("timeout of {}ms exceeded", self.timeout.as_millis()),
            );
        }
        if err.is_connect() {
            let text = error_chain(&err).to_lowercase();
            let code = if text.contains("dns") || text.contains("resolve") {
                "ENOTFOUND"
            } else {
                "ECONNRESET"
            };
            return RequestError::transport(Some(code), format!("Network error: {err}"));
        }
        if err.is_decode() {
            return RequestError::Decode {
                message: err.to_string(),
            };
        }
        RequestError::transport(None, format!("Network error: {err}"))
    }

    fn on_unauthorized(&self) {
        if let Some(tokens) = &self.tokens {
            warn!("Unauthorized response, clearing tokens");
            tokens.clear_tokens();
        }
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.timeout)
            .field("authenticated", &self.tokens.is_some())
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<HttpResponse, RequestError> {
        let mut request = self
            .client
            .request(method.into(), url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.tokens.as_ref().and_then(|t| t.current_token()) {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, url, "Sending request");
        let response = request
            .send()
            .await
            .map_err(|e| self.decode_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.decode_transport_error(e))?;

        if status.is_success() {
            let body = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).map_err(|e| RequestError::Decode {
                    message: e.to_string(),
                })?
            };
            return Ok(HttpResponse {
                status: status.as_u16(),
                body,
            });
        }

        if status == StatusCode::UNAUTHORIZED {
            self.on_unauthorized();
        }
        Err(status_error(status.as_u16(), &text))
    }
}

/// Decode a non-2xx body. FastAPI answers `{"detail": ...}`, other servers
/// `{"message": ...}`; anything else falls back to the status reason.
pub fn status_error(status: u16, text: &str) -> RequestError {
    let parsed: Option<Value> = serde_json::from_str(text).ok();

    let detail = parsed
        .as_ref()
        .and_then(|v| v.get("detail"))
        .map(|d| match d {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| detail.clone())
        .unwrap_or_else(|| {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Request failed")
                .to_string()
        });

    RequestError::Status {
        status,
        message,
        detail,
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_reads_detail() {
        let err = status_error(404, r#"{"detail": "Course not found"}"#);
        assert_eq!(
            err,
            RequestError::Status {
                status: 404,
                message: "Course not found".to_string(),
                detail: Some("Course not found".to_string()),
            }
        );
    }

    #[test]
    fn test_status_error_reads_message() {
        let err = status_error(500, r#"{"message": "Database unavailable"}"#);
        assert_eq!(err.http_status(), Some(500));
        assert!(err.to_string().contains("Database unavailable"));
    }

    #[test]
    fn test_status_error_structured_detail() {
        let err = status_error(422, r#"{"detail": [{"loc": ["body", "email"]}]}"#);
        match err {
            RequestError::Status { detail, .. } => {
                assert!(detail.unwrap().contains("email"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_error_plain_text_uses_reason() {
        let err = status_error(503, "upstream connect error");
        match err {
            RequestError::Status {
                message, detail, ..
            } => {
                assert_eq!(message, "Service Unavailable");
                assert_eq!(detail, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(reqwest::Method::from(Method::Get), reqwest::Method::GET);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let transport = HttpTransport::new(Duration::from_millis(500), None).unwrap();
        // port 9 (discard) is closed on test machines
        let err = transport
            .perform(Method::Get, "http://127.0.0.1:9/courses", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Transport { .. }));
    }
}
