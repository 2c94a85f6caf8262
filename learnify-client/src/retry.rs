//! Exponential-backoff retry.
//!
//! [`with_retry`] runs an async operation up to `max_retries + 1` times,
//! sleeping `min(initial_delay * multiplier^attempt, max_delay)` between
//! attempts. Only errors [`is_retryable`] accepts are retried; anything else
//! propagates at once.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use learnify_core::RequestError;
use tracing::warn;

use crate::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRYABLE_ERRORS, DEFAULT_RETRYABLE_STATUSES,
};

/// Retry policy for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub retryable_statuses: BTreeSet<u16>,
    pub retryable_errors: BTreeSet<String>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            retryable_errors: DEFAULT_RETRYABLE_ERRORS
                .iter()
                .map(|code| code.to_string())
                .collect(),
        }
    }
}

impl RetryOptions {
    /// These options with every field `overrides` sets replaced.
    pub fn merged(&self, overrides: &RetryOverrides) -> Self {
        Self {
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            initial_delay: overrides.initial_delay.unwrap_or(self.initial_delay),
            max_delay: overrides.max_delay.unwrap_or(self.max_delay),
            backoff_multiplier: overrides
                .backoff_multiplier
                .unwrap_or(self.backoff_multiplier),
            retryable_statuses: overrides
                .retryable_statuses
                .clone()
                .unwrap_or_else(|| self.retryable_statuses.clone()),
            retryable_errors: overrides
                .retryable_errors
                .clone()
                .unwrap_or_else(|| self.retryable_errors.clone()),
        }
    }

    /// Delay after the zero-indexed failed `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let cap = self.max_delay.as_millis() as f64;
        if !millis.is_finite() || millis >= cap {
            self.max_delay
        } else {
            Duration::from_millis(millis.max(0.0) as u64)
        }
    }
}

/// Per-call adjustments to [`RetryOptions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryOverrides {
    pub max_retries: Option<u32>,
    pub initial_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub backoff_multiplier: Option<f64>,
    pub retryable_statuses: Option<BTreeSet<u16>>,
    pub retryable_errors: Option<BTreeSet<String>>,
}

impl RetryOverrides {
    pub fn max_retries(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            ..Self::default()
        }
    }
}

/// Whether `err` is worth another attempt under `options`.
///
/// An error carrying an HTTP status is judged by status alone. Otherwise a
/// listed transport code, or a message mentioning a timeout or the network,
/// makes it retryable.
pub fn is_retryable(err: &RequestError, options: &RetryOptions) -> bool {
    if let Some(status) = err.http_status() {
        return options.retryable_statuses.contains(&status);
    }

    if err
        .code()
        .is_some_and(|code| options.retryable_errors.contains(code))
    {
        return true;
    }

    let message = err.to_string().to_lowercase();
    message.contains("timeout") || message.contains("network")
}

/// Run `operation` with retries, returning the first success or the last error.
pub async fn with_retry<F, Fut, T>(mut operation: F, options: &RetryOptions) -> Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= options.max_retries || !is_retryable(&err, options) {
                    return Err(err);
                }

                let delay = options.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = options.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_delay_schedule() {
        let options = RetryOptions::default();
        assert_eq!(options.delay_for_attempt(0), Duration::from_millis(1_000));
        assert_eq!(options.delay_for_attempt(1), Duration::from_millis(2_000));
        assert_eq!(options.delay_for_attempt(2), Duration::from_millis(4_000));
        assert_eq!(options.delay_for_attempt(3), Duration::from_millis(8_000));
        assert_eq!(options.delay_for_attempt(4), Duration::from_millis(10_000));
        assert_eq!(options.delay_for_attempt(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn test_classification() {
        let options = RetryOptions::default();

        assert!(is_retryable(&RequestError::status(503, "Service Unavailable"), &options));
        assert!(is_retryable(&RequestError::status(429, "Too Many Requests"), &options));
        assert!(!is_retryable(&RequestError::status(400, "Bad Request"), &options));
        assert!(!is_retryable(&RequestError::status(404, "request timeout"), &options));

        assert!(is_retryable(&RequestError::transport(Some("ECONNRESET"), "socket hang up"), &options));
        assert!(is_retryable(&RequestError::transport(None, "Network Error"), &options));
        assert!(is_retryable(&RequestError::transport(Some("EPIPE"), "read TIMEOUT"), &options));
        assert!(!is_retryable(&RequestError::transport(Some("EPIPE"), "broken pipe"), &options));

        let open = RequestError::BreakerOpen {
            class: learnify_core::RequestClass::Read,
        };
        assert!(!is_retryable(&open, &options));
    }

    #[test]
    fn test_overrides_merge() {
        let base = RetryOptions::default();
        let merged = base.merged(&RetryOverrides::max_retries(1));
        assert_eq!(merged.max_retries, 1);
        assert_eq!(merged.initial_delay, base.initial_delay);
        assert_eq!(merged.retryable_statuses, base.retryable_statuses);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = with_retry(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(RequestError::status(503, "Service Unavailable"))
                } else {
                    Ok("done")
                }
            },
            &RetryOptions::default(),
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3_000));
        assert!(elapsed < Duration::from_millis(3_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), _> = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RequestError::status(400, "Bad Request"))
            },
            &RetryOptions::default(),
        )
        .await;

        assert_eq!(result.unwrap_err().http_status(), Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_first_non_retryable_status() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(RequestError::status(500 + n as u16, "boom"))
            },
            &RetryOptions::default(),
        )
        .await;

        // 500 is retried, 501 is not
        assert_eq!(result.unwrap_err().http_status(), Some(501));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_retries_bounds_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RequestError::transport(Some("ETIMEDOUT"), "timeout of 10000ms exceeded"))
            },
            &RetryOptions::default(),
        )
        .await;

        assert_eq!(result.unwrap_err().code(), Some("ETIMEDOUT"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
