//! Circuit breakers, one per request class.
//!
//! - `Closed`: calls pass; failures count up and open the breaker at
//!   `failure_threshold`.
//! - `Open`: calls fail with [`RequestError::BreakerOpen`] without running
//!   until `reset_timeout` has passed since the last failure, then the breaker
//!   moves to `HalfOpen` and lets the call through.
//! - `HalfOpen`: `success_threshold` successes close it; one failure reopens.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use learnify_core::{to_time_delta, CircuitState, Clock, RequestClass, RequestError, Timestamp};
use serde::Serialize;
use tracing::{debug, info};

use crate::constants::{
    DEFAULT_CIRCUIT_FAILURE_THRESHOLD, DEFAULT_CIRCUIT_RESET_TIMEOUT_SECS,
    DEFAULT_CIRCUIT_SUCCESS_THRESHOLD, WRITE_CIRCUIT_FAILURE_THRESHOLD,
    WRITE_CIRCUIT_RESET_TIMEOUT_SECS,
};

// ============================================================================
// CONFIG
// ============================================================================

/// Configuration for circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_CIRCUIT_SUCCESS_THRESHOLD,
            reset_timeout: Duration::from_secs(DEFAULT_CIRCUIT_RESET_TIMEOUT_SECS),
        }
    }
}

impl CircuitBreakerConfig {
    /// Built-in defaults for a request class. Writes trip sooner and stay
    /// open longer.
    pub fn for_class(class: RequestClass) -> Self {
        match class {
            RequestClass::Write => Self {
                failure_threshold: WRITE_CIRCUIT_FAILURE_THRESHOLD,
                reset_timeout: Duration::from_secs(WRITE_CIRCUIT_RESET_TIMEOUT_SECS),
                ..Self::default()
            },
            RequestClass::Read | RequestClass::Default => Self::default(),
        }
    }

    /// These settings with any `LEARNIFY_CIRCUIT_<CLASS>_*` variables applied.
    ///
    /// # Environment Variables
    /// - `LEARNIFY_CIRCUIT_<CLASS>_FAILURE_THRESHOLD`: failures before opening
    /// - `LEARNIFY_CIRCUIT_<CLASS>_SUCCESS_THRESHOLD`: half-open successes to close
    /// - `LEARNIFY_CIRCUIT_<CLASS>_RESET_TIMEOUT_SECS`: how long the circuit stays open
    ///
    /// `<CLASS>` is `READ`, `WRITE` or `DEFAULT`. Unparseable values are ignored.
    pub fn with_env_overrides(self, class: RequestClass) -> Self {
        self.with_overrides(class, |name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`, keyed by environment variable name.
    pub fn with_overrides<F>(self, class: RequestClass, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = format!("LEARNIFY_CIRCUIT_{}", class.as_str().to_ascii_uppercase());
        let parse = |suffix: &str| -> Option<u64> {
            lookup(&format!("{prefix}_{suffix}")).and_then(|v| v.trim().parse().ok())
        };

        Self {
            failure_threshold: parse("FAILURE_THRESHOLD")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(self.failure_threshold),
            success_threshold: parse("SUCCESS_THRESHOLD")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(self.success_threshold),
            reset_timeout: parse("RESET_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(self.reset_timeout),
        }
    }
}

// ============================================================================
// BREAKER
// ============================================================================

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<Timestamp>,
}

impl BreakerSnapshot {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
        }
    }
}

/// Failure gate for one request class.
pub struct CircuitBreaker {
    class: RequestClass,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerSnapshot>,
}

impl CircuitBreaker {
    pub fn new(class: RequestClass, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            class,
            config,
            clock,
            inner: Mutex::new(BreakerSnapshot::closed()),
        }
    }

    pub fn class(&self) -> RequestClass {
        self.class
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        self.lock().clone()
    }

    /// Run `operation` through the breaker.
    ///
    /// Fails with [`RequestError::BreakerOpen`] without calling `operation`
    /// while the breaker is open and the reset timeout has not elapsed.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, RequestError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        self.check_state()?;

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    /// Force the breaker closed with zeroed counters.
    pub fn reset(&self) {
        *self.lock() = BreakerSnapshot::closed();
        info!(class = %self.class, "Circuit breaker reset");
    }

    fn check_state(&self) -> Result<(), RequestError> {
        let mut inner = self.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let now = self.clock.now();
        let reset_after = to_time_delta(self.config.reset_timeout);
        let expired = inner
            .last_failure_time
            .map_or(true, |last| now.signed_duration_since(last) >= reset_after);

        if expired {
            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
            debug!(class = %self.class, "Circuit breaker half-open");
            Ok(())
        } else {
            Err(RequestError::BreakerOpen { class: self.class })
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    info!(class = %self.class, "Circuit breaker closed");
                }
            }
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count += 1;
        inner.last_failure_time = Some(self.clock.now());

        let reopen = inner.state == CircuitState::HalfOpen;
        if reopen || inner.failure_count >= self.config.failure_threshold {
            if inner.state != CircuitState::Open {
                info!(
                    class = %self.class,
                    failure_count = inner.failure_count,
                    "Circuit breaker opened"
                );
            }
            inner.state = CircuitState::Open;
            inner.success_count = 0;
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.snapshot();
        f.debug_struct("CircuitBreaker")
            .field("class", &self.class)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .field("success_count", &inner.success_count)
            .finish()
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// The read, write and default breakers of one client.
#[derive(Debug, Clone)]
pub struct BreakerRegistry {
    read: Arc<CircuitBreaker>,
    write: Arc<CircuitBreaker>,
    default: Arc<CircuitBreaker>,
}

impl BreakerRegistry {
    /// Breakers with the built-in per-class defaults.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_configs(
            CircuitBreakerConfig::for_class(RequestClass::Read),
            CircuitBreakerConfig::for_class(RequestClass::Write),
            CircuitBreakerConfig::for_class(RequestClass::Default),
            clock,
        )
    }

    pub fn with_configs(
        read: CircuitBreakerConfig,
        write: CircuitBreakerConfig,
        default: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            read: Arc::new(CircuitBreaker::new(RequestClass::Read, read, clock.clone())),
            write: Arc::new(CircuitBreaker::new(RequestClass::Write, write, clock.clone())),
            default: Arc::new(CircuitBreaker::new(RequestClass::Default, default, clock)),
        }
    }

    pub fn get(&self, class: RequestClass) -> &Arc<CircuitBreaker> {
        match class {
            RequestClass::Read => &self.read,
            RequestClass::Write => &self.write,
            RequestClass::Default => &self.default,
        }
    }

    pub fn snapshots(&self) -> Vec<(RequestClass, BreakerSnapshot)> {
        RequestClass::ALL
            .iter()
            .map(|class| (*class, self.get(*class).snapshot()))
            .collect()
    }
}
