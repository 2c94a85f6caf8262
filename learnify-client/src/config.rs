//! Configuration loading for the Learnify client.
//!
//! TOML file given by `--config <path>` or `LEARNIFY_CONFIG`. Every section
//! is optional and falls back to the documented defaults; unknown keys are
//! rejected.
//!
//! Breaker thresholds for all three request classes come from
//! `[breaker.read]`, `[breaker.write]` and `[breaker.default]`;
//! `LEARNIFY_CIRCUIT_<CLASS>_*` variables override the file per class.

use std::path::{Path, PathBuf};
use std::time::Duration;

use learnify_core::RequestClass;
use serde::Deserialize;

use crate::breaker::CircuitBreakerConfig;
use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_CACHE_MAP_SIZE_MB,
    DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_REQUEST_TIMEOUT_MS,
};
use crate::retry::RetryOptions;
use learnify_storage::DEFAULT_CACHE_PREFIX;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub cache_prefix: String,
    /// LMDB directory. The cache is in-memory when unset.
    pub cache_path: Option<PathBuf>,
    pub cache_map_size_mb: usize,
    pub retry: RetrySection,
    pub breaker: BreakerSection,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BreakerSection {
    pub read: BreakerThresholds,
    pub write: BreakerThresholds,
    pub default: BreakerThresholds,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakerThresholds {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            cache_path: None,
            cache_map_size_mb: DEFAULT_CACHE_MAP_SIZE_MB,
            retry: RetrySection::default(),
            breaker: BreakerSection::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            read: BreakerThresholds::from(CircuitBreakerConfig::for_class(RequestClass::Read)),
            write: BreakerThresholds::from(CircuitBreakerConfig::for_class(RequestClass::Write)),
            default: BreakerThresholds::from(CircuitBreakerConfig::for_class(
                RequestClass::Default,
            )),
        }
    }
}

impl From<CircuitBreakerConfig> for BreakerThresholds {
    fn from(config: CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            success_threshold: config.success_threshold,
            reset_timeout_ms: u64::try_from(config.reset_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl BreakerThresholds {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
        }
    }

    fn validate(&self, failure_field: &'static str, success_field: &'static str) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: failure_field,
                reason: "must be > 0".to_string(),
            });
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: success_field,
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl ClientConfig {
    /// Load from `--config` or `LEARNIFY_CONFIG`; defaults when neither is set.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match config_path_from_args().or_else(config_path_from_env) {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cache_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cache_map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache_map_size_mb",
                reason: "must be > 0".to_string(),
            });
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_delay_ms",
                reason: "must be >= initial_delay_ms".to_string(),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.backoff_multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        self.breaker
            .read
            .validate("breaker.read.failure_threshold", "breaker.read.success_threshold")?;
        self.breaker
            .write
            .validate("breaker.write.failure_threshold", "breaker.write.success_threshold")?;
        self.breaker.default.validate(
            "breaker.default.failure_threshold",
            "breaker.default.success_threshold",
        )?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Breaker settings for `class`: the file's section, then env overrides.
    pub fn breaker_config(&self, class: RequestClass) -> CircuitBreakerConfig {
        let section = match class {
            RequestClass::Read => &self.breaker.read,
            RequestClass::Write => &self.breaker.write,
            RequestClass::Default => &self.breaker.default,
        };
        section.to_breaker_config().with_env_overrides(class)
    }

    pub fn retry_options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.retry.max_retries,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_multiplier: self.retry.backoff_multiplier,
            ..RetryOptions::default()
        }
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("LEARNIFY_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
