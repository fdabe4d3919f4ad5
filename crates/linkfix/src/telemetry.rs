//! Tracing subscriber setup.

use crate::LoggingConfig;
use linkfix_error::{ConfigError, LinkfixResult};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// Filter directives come from `RUST_LOG`, falling back to
/// `logging.level`. Output is human-readable unless `logging.json` is set.
///
/// # Errors
///
/// A `ConfigError` if the level directives do not parse or a global
/// subscriber is already installed.
pub fn init_tracing(logging: &LoggingConfig) -> LinkfixResult<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(logging.level())
            .map_err(|e| ConfigError::invalid("logging.level", e))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if *logging.json() {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };
    installed
        .map_err(|e| ConfigError::new(format!("Failed to install tracing subscriber: {}", e)))?;

    info!(json = *logging.json(), "Tracing initialized");
    Ok(())
}
