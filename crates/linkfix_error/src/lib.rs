//! Error types for linkfix.
//!
//! This crate provides the error types shared by the document store, the rate
//! limiter and the bot facade.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use linkfix_error::{LinkfixResult, StoreError, StoreErrorKind};
//!
//! fn update_players() -> LinkfixResult<()> {
//!     Err(StoreError::new(StoreErrorKind::NotCached("rpg/players.json".to_string())))?
//! }
//!
//! match update_players() {
//!     Ok(()) => println!("updated"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod store;

pub use config::ConfigError;
pub use error::{LinkfixError, LinkfixErrorKind, LinkfixResult};
pub use store::{StoreError, StoreErrorKind, StoreResult};
