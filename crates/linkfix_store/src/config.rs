//! Document store configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`CacheStore`](crate::CacheStore).
///
/// Deserializes from the `[store]` table of `linkfix.toml`; missing fields fall
/// back to the defaults below.
///
/// ```
/// use linkfix_store::{StoreConfig, StoreConfigBuilder};
/// use std::time::Duration;
///
/// let config = StoreConfigBuilder::default()
///     .flush_interval_secs(5u64)
///     .build()
///     .unwrap();
/// assert_eq!(config.flush_interval(), Duration::from_secs(5));
/// assert_eq!(*config.max_retries(), 3);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
pub struct StoreConfig {
    /// Seconds between background flushes of dirty documents
    #[serde(default = "default_flush_interval_secs")]
    #[builder(default = "default_flush_interval_secs()")]
    flush_interval_secs: u64,

    /// Total attempts for an atomic update before giving up
    #[serde(default = "default_max_retries")]
    #[builder(default = "default_max_retries()")]
    max_retries: u32,

    /// Base backoff; attempt `n` waits `n * retry_backoff_ms` before the next try
    #[serde(default = "default_retry_backoff_ms")]
    #[builder(default = "default_retry_backoff_ms()")]
    retry_backoff_ms: u64,
}

fn default_flush_interval_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

impl StoreConfig {
    /// Interval of the background flush task.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// Backoff step for atomic update retries.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"max_retries": 5}"#).unwrap();
        assert_eq!(*config.max_retries(), 5);
        assert_eq!(config.flush_interval(), Duration::from_secs(30));
        assert_eq!(config.retry_backoff(), Duration::from_millis(100));
    }

    #[test]
    fn setters_override_single_fields() {
        let config = StoreConfig::default().with_retry_backoff_ms(10);
        assert_eq!(config.retry_backoff(), Duration::from_millis(10));
        assert_eq!(*config.flush_interval_secs(), 30);
    }
}
