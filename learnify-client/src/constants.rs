//! Constants for the Learnify client
//!
//! Defaults for the transport, breakers, retry policy and cache lifetimes.

use std::time::Duration;

// ============================================================================
// TRANSPORT
// ============================================================================

/// Backend base URL used when no config is given.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3001/api";

/// Per-request deadline in milliseconds (10 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

/// Consecutive failures before a read/default breaker opens
pub const DEFAULT_CIRCUIT_FAILURE_THRESHOLD: u32 = 5;

/// Half-open successes needed to close a breaker
pub const DEFAULT_CIRCUIT_SUCCESS_THRESHOLD: u32 = 2;

/// How long a read/default breaker stays open, in seconds
pub const DEFAULT_CIRCUIT_RESET_TIMEOUT_SECS: u64 = 30;

/// Consecutive failures before the write breaker opens
pub const WRITE_CIRCUIT_FAILURE_THRESHOLD: u32 = 3;

/// How long the write breaker stays open, in seconds
pub const WRITE_CIRCUIT_RESET_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// RETRY
// ============================================================================

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Retry budget for non-idempotent writes.
pub const WRITE_MAX_RETRIES: u32 = 1;

/// HTTP statuses worth retrying.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Transport error codes worth retrying.
pub const DEFAULT_RETRYABLE_ERRORS: [&str; 4] = ["ECONNABORTED", "ETIMEDOUT", "ENOTFOUND", "ECONNRESET"];

// ============================================================================
// CACHE
// ============================================================================

/// Lifetime of cached list responses (5 minutes)
pub const LIST_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Lifetime of cached single-entity responses (10 minutes)
pub const DETAIL_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Lifetime of cached per-user responses (1 minute)
pub const USER_CACHE_TTL: Duration = Duration::from_secs(60);

/// LMDB map size when a cache path is configured
pub const DEFAULT_CACHE_MAP_SIZE_MB: usize = 64;

// ============================================================================
// AUTH
// ============================================================================

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
