//! The runtime context handed to every bot feature.

use crate::LinkfixConfig;
use linkfix_error::{ConfigError, LinkfixResult};
use linkfix_rate_limit::{BurstDecision, CooldownStatus, RateLimiter};
use linkfix_store::{CacheStore, DocumentBackend, FileSystemBackend};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// One document store and one rate limiter, built from configuration.
///
/// Construct it once at startup and clone it into each handler; clones
/// share all state.
///
/// # Example
///
/// ```no_run
/// use linkfix::{BotContext, LinkfixConfig};
/// use serde_json::{Value, json};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = LinkfixConfig::load()?;
/// let context = BotContext::new(config)?;
/// context.start();
///
/// if context.is_allowed("alice") && !context.check_cooldown("alice", "macro").is_on_cooldown() {
///     let macros: Value = context.load_document("image_macros.json", json!({})).await;
///     context.start_cooldown("alice", "macro")?;
///     # let _ = macros;
/// }
///
/// context.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BotContext {
    config: Arc<LinkfixConfig>,
    store: CacheStore,
    limiter: RateLimiter,
}

impl BotContext {
    /// Build a context persisting documents under `store.data_dir`.
    ///
    /// # Errors
    ///
    /// A store error if the data directory cannot be created.
    pub fn new(config: LinkfixConfig) -> LinkfixResult<Self> {
        let backend = FileSystemBackend::new(config.store().data_dir())?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Build a context over any backend.
    pub fn with_backend(config: LinkfixConfig, backend: Arc<dyn DocumentBackend>) -> Self {
        let store = CacheStore::new(backend, config.store().store_config().clone());
        let limiter = RateLimiter::new(config.rate_limit().clone());
        Self {
            config: Arc::new(config),
            store,
            limiter,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &LinkfixConfig {
        &self.config
    }

    /// The document store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// The rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Start the background flush and cleanup tasks.
    pub fn start(&self) {
        self.store.initialize();
        self.limiter.start_cleanup();
        info!("Bot context started");
    }

    /// Stop background tasks and flush every dirty document.
    ///
    /// Returns the number of documents written by the final flush.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> LinkfixResult<usize> {
        self.limiter.stop_cleanup().await;
        let flushed = self.store.shutdown().await?;
        info!(flushed, "Bot context shut down");
        Ok(flushed)
    }

    /// Load a document, creating it from `default` when missing.
    pub async fn load_document<T>(&self, key: &str, default: T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        self.store.load(key, default).await
    }

    /// Cache every configured document that already exists.
    ///
    /// Missing documents are reported, not created. Returns each document
    /// key mapped to whether it was found.
    pub async fn load_configured_documents(&self) -> BTreeMap<String, bool> {
        let mut found = BTreeMap::new();
        for (_, key) in self.config.documents().all() {
            let present = self.store.load_existing::<Value>(key).await.is_some();
            found.insert(key.to_string(), present);
        }
        found
    }

    /// Mutate a loaded document in memory; it is written on the next flush.
    pub fn mutate_document<T, F>(&self, key: &str, mutate: F) -> LinkfixResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(T) -> T,
    {
        Ok(self.store.update(key, mutate)?)
    }

    /// Replace a loaded document in memory; it is written on the next flush.
    pub fn replace_document<T>(&self, key: &str, data: T) -> LinkfixResult<T>
    where
        T: Serialize,
    {
        Ok(self.store.replace(key, data)?)
    }

    /// Read-modify-write against storage with retries, for changes that must
    /// not be lost on a crash.
    pub async fn mutate_document_atomically<T, F>(&self, key: &str, mutate: F) -> LinkfixResult<T>
    where
        T: Serialize + DeserializeOwned + Default,
        F: Fn(T) -> T,
    {
        Ok(self.store.atomic_update(key, mutate).await?)
    }

    /// Write every dirty document now.
    pub async fn flush_all(&self) -> LinkfixResult<usize> {
        Ok(self.store.save_dirty_files().await?)
    }

    /// Whether `actor` is under the configured reply limit. Records the reply
    /// when it is.
    pub fn is_allowed(&self, actor: &str) -> bool {
        self.limiter.is_allowed(actor)
    }

    /// Cooldown status of `action` for `actor`.
    pub fn check_cooldown(&self, actor: &str, action: &str) -> CooldownStatus {
        self.limiter.check_cooldown(actor, action)
    }

    /// Block `action` for `actor` for `duration`.
    pub fn set_cooldown(&self, actor: &str, action: &str, duration: Duration) {
        self.limiter.set_cooldown(actor, action, duration)
    }

    /// Block `action` for `actor` for its configured cooldown.
    ///
    /// # Errors
    ///
    /// A `ConfigError` if `[cooldowns]` has no entry for `action`.
    pub fn start_cooldown(&self, actor: &str, action: &str) -> LinkfixResult<Duration> {
        let duration = self.config.cooldown(action).ok_or_else(|| {
            ConfigError::invalid(format!("cooldowns.{}", action), "no cooldown configured")
        })?;
        self.limiter.set_cooldown(actor, action, duration);
        Ok(duration)
    }

    /// Burst check against the configured policy.
    pub fn check_burst(&self, actor: &str, action: &str) -> BurstDecision {
        self.limiter.check_burst(actor, action)
    }
}
