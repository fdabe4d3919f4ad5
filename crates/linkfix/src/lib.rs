//! Runtime for the linkfix chat bot.
//!
//! This crate ties the document store and rate limiter together behind a
//! single [`BotContext`] built from layered configuration, and ships the
//! `linkfix` admin binary.
//!
//! # Example
//!
//! ```rust
//! use linkfix::{BotContext, LinkfixConfig, MemoryBackend};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = BotContext::with_backend(LinkfixConfig::default(), Arc::new(MemoryBackend::new()));
//!
//! context.load_document("requests.json", json!({"open": []})).await;
//! context.mutate_document("requests.json", |mut doc: serde_json::Value| {
//!     doc["open"] = json!(["dark mode"]);
//!     doc
//! })?;
//! assert_eq!(context.flush_all().await?, 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
pub mod telemetry;

pub use config::{DocumentPaths, LinkfixConfig, LoggingConfig, StoreSettings};
pub use context::BotContext;
pub use linkfix_error::{ConfigError, LinkfixError, LinkfixErrorKind, LinkfixResult};
pub use linkfix_rate_limit::{BurstDecision, BurstPolicy, CooldownStatus, RateLimitConfig, RateLimiter};
pub use linkfix_store::{CacheStore, DocumentBackend, FileSystemBackend, MemoryBackend, StoreConfig};
