//! Storage trait definition.

use linkfix_error::StoreResult;

/// Trait for pluggable document persistence.
///
/// Implementations move raw bytes in and out of durable storage. They know
/// nothing about JSON, caching or dirty tracking; those live in
/// [`CacheStore`](crate::CacheStore).
#[async_trait::async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Read the persisted bytes for a document.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if nothing is stored under `key`. Any other failure is an
    /// error of kind `FileRead`.
    async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replace the persisted bytes for a document.
    ///
    /// Implementations should make the replacement atomic: a reader sees
    /// either the old bytes or the new bytes, never a mix.
    async fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Short backend name used in log fields.
    fn name(&self) -> &'static str;
}
