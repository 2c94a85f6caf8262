//! Error types for Learnify operations

use crate::RequestClass;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single outbound request, decoded once at the transport
/// boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// Network-level failure: connect, DNS, reset, timeout.
    #[error("Transport failure: {message}")]
    Transport {
        code: Option<String>,
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("Request failed with status {status}: {message}")]
    Status {
        status: u16,
        message: String,
        detail: Option<String>,
    },

    /// The breaker for this request class refused the call.
    #[error("Circuit breaker is OPEN for {class} requests")]
    BreakerOpen { class: RequestClass },

    /// The response body did not match the expected shape.
    #[error("Invalid response body: {message}")]
    Decode { message: String },
}

impl RequestError {
    pub fn transport(code: Option<&str>, message: impl Into<String>) -> Self {
        Self::Transport {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
            detail: None,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transport error code (`ETIMEDOUT`, `ECONNRESET`, ...), if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Transport { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn is_breaker_open(&self) -> bool {
        matches!(self, Self::BreakerOpen { .. })
    }
}

/// Normalized error surfaced to callers of the service layer.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            detail: None,
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Status {
                status,
                message,
                detail,
            } => Self {
                message: detail.clone().unwrap_or(message),
                status: Some(status),
                detail,
            },
            other => Self::new(other.to_string()),
        }
    }
}

/// Persistent key-value substrate errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend failure: {reason}")]
    Backend { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Master error type for all Learnify errors.
#[derive(Debug, Clone, Error)]
pub enum LearnifyError {
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for Learnify operations.
pub type LearnifyResult<T> = Result<T, LearnifyError>;

/// Result type alias for substrate operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_accessors() {
        let err = RequestError::transport(Some("ETIMEDOUT"), "timeout of 10000ms exceeded");
        assert_eq!(err.code(), Some("ETIMEDOUT"));
        assert_eq!(err.http_status(), None);

        let err = RequestError::status(503, "Service Unavailable");
        assert_eq!(err.http_status(), Some(503));
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_breaker_open_display() {
        let err = RequestError::BreakerOpen {
            class: RequestClass::Write,
        };
        let msg = err.to_string();
        assert!(msg.contains("OPEN"));
        assert!(msg.contains("write"));
        assert!(err.is_breaker_open());
    }

    #[test]
    fn test_api_error_prefers_detail() {
        let err = RequestError::Status {
            status: 404,
            message: "Not Found".to_string(),
            detail: Some("Course not found".to_string()),
        };
        let api = ApiError::from(err);
        assert_eq!(api.message, "Course not found");
        assert_eq!(api.status, Some(404));
        assert_eq!(api.detail.as_deref(), Some("Course not found"));
    }

    #[test]
    fn test_api_error_from_transport() {
        let api = ApiError::from(RequestError::transport(None, "Network Error"));
        assert!(api.message.contains("Network Error"));
        assert_eq!(api.status, None);
        assert_eq!(api.detail, None);
    }

    #[test]
    fn test_learnify_error_from_variants() {
        let storage = LearnifyError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, LearnifyError::Storage(_)));

        let request = LearnifyError::from(RequestError::status(500, "boom"));
        assert!(matches!(request, LearnifyError::Request(_)));

        let api = LearnifyError::from(ApiError::new("nope"));
        assert!(matches!(api, LearnifyError::Api(_)));
    }
}
