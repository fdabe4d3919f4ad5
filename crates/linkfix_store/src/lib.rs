//! Write-behind JSON document store for linkfix.
//!
//! Bot features keep their state (image macros, feature requests, RPG players)
//! in JSON documents addressed by an opaque key. [`CacheStore`] keeps every
//! loaded document in memory, tracks which ones have unsaved mutations, and
//! flushes them on a timer or on demand.
//!
//! # Features
//!
//! - **Degrading reads**: `load` never fails; missing documents are created from
//!   the supplied default and corrupt ones fall back to it
//! - **Dirty tracking**: `update` mutates in memory and defers the write
//! - **Atomic updates**: `atomic_update` re-reads storage, writes synchronously,
//!   and retries with linear backoff
//! - **Pluggable backends**: [`DocumentBackend`] abstracts the persistence layer
//!
//! # Example
//!
//! ```rust
//! use linkfix_store::{CacheStore, MemoryBackend, StoreConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CacheStore::new(Arc::new(MemoryBackend::new()), StoreConfig::default());
//!
//! let requests = store.load("requests.json", json!({"open": []})).await;
//! assert_eq!(requests, json!({"open": []}));
//!
//! store.update("requests.json", |mut doc: serde_json::Value| {
//!     doc["open"] = json!(["dark mode"]);
//!     doc
//! })?;
//! assert!(store.is_dirty("requests.json"));
//!
//! store.save_dirty_files().await?;
//! assert!(!store.is_dirty("requests.json"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod filesystem;
mod memory;
mod store;

pub use backend::DocumentBackend;
pub use config::{StoreConfig, StoreConfigBuilder};
pub use filesystem::FileSystemBackend;
pub use linkfix_error::{StoreError, StoreErrorKind, StoreResult};
pub use memory::MemoryBackend;
pub use store::{CacheStore, StoreStats, backup_key};
