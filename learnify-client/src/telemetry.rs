//! Tracing subscriber setup for the `learnify` binary.
//!
//! Libraries only emit `tracing` events; installing a subscriber is left to
//! the process entry point.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "learnify=info,learnify_client=info,learnify_storage=info";

#[derive(Debug, thiserror::Error)]
#[error("Failed to init subscriber: {0}")]
pub struct TelemetryError(String);

/// Install the global subscriber: `RUST_LOG` filter (or
/// [`DEFAULT_LOG_FILTER`]) and a fmt layer on stderr, JSON-formatted when
/// `LEARNIFY_LOG_JSON=1`.
pub fn init_tracing() -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json_logs_enabled() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| TelemetryError(e.to_string()))?;

    tracing::debug!(json = json_logs_enabled(), "Tracing initialized");
    Ok(())
}

fn json_logs_enabled() -> bool {
    std::env::var("LEARNIFY_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
