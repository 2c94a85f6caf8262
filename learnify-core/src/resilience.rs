//! Shared resilience vocabulary: circuit states and request classes.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CIRCUIT STATE
// ============================================================================

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed = 0,
    /// Circuit is open, requests are rejected
    Open = 1,
    /// Circuit is half-open, probing whether the backend recovered
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// REQUEST CLASS
// ============================================================================

/// Which breaker guards a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    Read,
    Write,
    Default,
}

impl RequestClass {
    pub const ALL: [RequestClass; 3] = [RequestClass::Read, RequestClass::Write, RequestClass::Default];

    /// Classify an HTTP verb: GET reads, everything else writes.
    pub fn for_method(method: &str) -> Self {
        if method.eq_ignore_ascii_case("GET") {
            RequestClass::Read
        } else {
            RequestClass::Write
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_class_for_method() {
        assert_eq!(RequestClass::for_method("GET"), RequestClass::Read);
        assert_eq!(RequestClass::for_method("get"), RequestClass::Read);
        assert_eq!(RequestClass::for_method("POST"), RequestClass::Write);
        assert_eq!(RequestClass::for_method("PUT"), RequestClass::Write);
        assert_eq!(RequestClass::for_method("DELETE"), RequestClass::Write);
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }
}
