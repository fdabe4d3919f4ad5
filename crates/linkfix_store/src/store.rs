//! Write-behind document cache.

use crate::{DocumentBackend, StoreConfig};
use chrono::{DateTime, SecondsFormat, Utc};
use derive_getters::Getters;
use linkfix_error::{StoreError, StoreErrorKind, StoreResult};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, error, info, instrument, warn};

/// Diagnostic snapshot of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Getters)]
pub struct StoreStats {
    /// Number of documents held in memory
    cached_documents: usize,
    /// Number of keys with unflushed mutations
    dirty_documents: usize,
    /// Size of all cached documents serialized as compact JSON
    approximate_bytes: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<String, Value>,
    dirty: HashSet<String>,
    // Bumped on every in-memory change; a write only commits if its key
    // has not moved on since the write began.
    revisions: HashMap<String, u64>,
}

impl StoreState {
    fn revision(&self, key: &str) -> u64 {
        self.revisions.get(key).copied().unwrap_or(0)
    }

    fn touch(&mut self, key: &str) {
        *self.revisions.entry(key.to_string()).or_insert(0) += 1;
    }

    fn set(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
        self.touch(key);
    }

    /// Cached value of `key` if it carries unflushed changes.
    fn pending(&self, key: &str) -> Option<Value> {
        if self.dirty.contains(key) {
            self.entries.get(key).cloned()
        } else {
            None
        }
    }
}

struct FlushTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct CacheStoreInner {
    backend: Arc<dyn DocumentBackend>,
    config: StoreConfig,
    state: Mutex<StoreState>,
    // Serializes every backend write so a flush cannot race an explicit save.
    write_gate: tokio::sync::Mutex<()>,
    flush_task: Mutex<Option<FlushTask>>,
}

/// In-memory document cache with dirty tracking and timed flush.
///
/// Cloning is cheap and every clone shares the same cache, so one store can be
/// handed to every handler and to the background flush task.
///
/// Each document moves through three states:
///
/// ```text
/// Uncached --load--> Cached(clean) --update/replace/mark_dirty--> Cached(dirty)
///                         ^                                            |
///                         +-------------- flush / save ----------------+
/// ```
///
/// `atomic_update` skips the dirty state: it writes through and always leaves
/// the document clean.
///
/// The entry map and dirty set sit behind one lock that is never held across
/// an `.await`. Backend writes are serialized by a separate async gate.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<CacheStoreInner>,
}

impl CacheStore {
    /// Create a store over `backend`. No background work starts until
    /// [`initialize`](Self::initialize) is called.
    pub fn new(backend: Arc<dyn DocumentBackend>, config: StoreConfig) -> Self {
        tracing::debug!(
            backend = backend.name(),
            flush_interval_secs = config.flush_interval_secs(),
            max_retries = config.max_retries(),
            "Creating new CacheStore"
        );
        Self {
            inner: Arc::new(CacheStoreInner {
                backend,
                config,
                state: Mutex::new(StoreState::default()),
                write_gate: tokio::sync::Mutex::new(()),
                flush_task: Mutex::new(None),
            }),
        }
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Start the periodic flush task.
    ///
    /// Must be called from within a tokio runtime. Calling it while the task
    /// is already running does nothing.
    pub fn initialize(&self) {
        let mut task = self.inner.flush_task.lock();
        if task.is_some() {
            warn!("Flush task already running");
            return;
        }

        let period = self.inner.config.flush_interval().max(Duration::from_secs(1));
        let (shutdown, mut stop) = watch::channel(false);
        let store = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = store.save_dirty_files().await {
                            warn!(error = %e, "Background flush failed, will retry on next tick");
                        }
                    }
                    _ = stop.changed() => break,
                }
            }

            debug!("Flush task stopped");
        });

        *task = Some(FlushTask { shutdown, handle });
        info!(interval_secs = period.as_secs(), "Document store initialized");
    }

    /// Whether the background flush task is running.
    pub fn is_running(&self) -> bool {
        self.inner.flush_task.lock().is_some()
    }

    /// Stop the flush task and flush everything still dirty.
    ///
    /// The task finishes any flush pass already in progress before it exits.
    ///
    /// # Returns
    ///
    /// The number of documents written by the final flush.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> StoreResult<usize> {
        let task = self.inner.flush_task.lock().take();
        if let Some(FlushTask { shutdown, handle }) = task {
            let _ = shutdown.send(true);
            if let Err(e) = handle.await {
                warn!(error = %e, "Flush task ended abnormally");
            }
        }

        let flushed = self.save_dirty_files().await?;
        info!(flushed, "Document store shut down");
        Ok(flushed)
    }

    /// Load a document, caching it on first access.
    ///
    /// This never fails:
    /// - a cached document is returned from memory;
    /// - a missing document is created from `default`, persisted and cached;
    /// - an unreadable or unparsable document is logged and `default` is
    ///   returned without being persisted or cached;
    /// - a document whose shape does not match `T` yields `default`.
    #[instrument(skip(self, default))]
    pub async fn load<T>(&self, key: &str, default: T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        let cached = self.inner.state.lock().entries.get(key).cloned();
        if let Some(value) = cached {
            debug!("Cache hit");
            return decode_or_default(key, value, default);
        }

        match self.inner.backend.read(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => {
                    let value = {
                        let mut state = self.inner.state.lock();
                        match state.entries.get(key).cloned() {
                            Some(existing) => existing,
                            None => {
                                state.set(key, value.clone());
                                value
                            }
                        }
                    };
                    debug!(size = bytes.len(), "Loaded document");
                    decode_or_default(key, value, default)
                }
                Err(e) => {
                    error!(error = %e, "Failed to parse document, using default");
                    default
                }
            },
            Ok(None) => self.create_default(key, default).await,
            Err(e) => {
                error!(error = %e, "Failed to read document, using default");
                default
            }
        }
    }

    /// Load a document only if it is cached or persisted.
    ///
    /// Unlike [`load`](Self::load) this never creates anything: a missing,
    /// unreadable or unparsable document yields `None` and leaves storage
    /// untouched. A readable document is cached.
    #[instrument(skip(self))]
    pub async fn load_existing<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let cached = self.inner.state.lock().entries.get(key).cloned();
        let value = match cached {
            Some(value) => value,
            None => {
                let bytes = match self.inner.backend.read(key).await {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => {
                        debug!("Document does not exist");
                        return None;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read document");
                        return None;
                    }
                };
                let parsed = serde_json::from_slice::<Value>(&bytes)
                    .inspect_err(|e| error!(error = %e, "Failed to parse document"))
                    .ok()?;
                let mut state = self.inner.state.lock();
                match state.entries.get(key).cloned() {
                    Some(existing) => existing,
                    None => {
                        state.set(key, parsed.clone());
                        parsed
                    }
                }
            }
        };

        decode(key, value)
            .inspect_err(|e| warn!(error = %e, "Document does not match expected shape"))
            .ok()
    }

    async fn create_default<T>(&self, key: &str, default: T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        let value = match encode(key, &default) {
            Ok(value) => value,
            Err(e) => {
                error!(error = %e, "Failed to encode default document");
                return default;
            }
        };

        let _gate = self.inner.write_gate.lock().await;

        // Another writer may have created the document while we waited.
        let existing = self.inner.state.lock().entries.get(key).cloned();
        if let Some(existing) = existing {
            return decode_or_default(key, existing, default);
        }

        let written = match to_bytes(key, &value) {
            Ok(bytes) => self.inner.backend.write(key, &bytes).await,
            Err(e) => Err(e),
        };

        let mut state = self.inner.state.lock();
        if let Some(existing) = state.entries.get(key).cloned() {
            drop(state);
            return decode_or_default(key, existing, default);
        }
        state.set(key, value);
        match written {
            Ok(()) => debug!("Created new document with defaults"),
            Err(e) => {
                error!(error = %e, "Failed to persist default document, will retry on next flush");
                state.dirty.insert(key.to_string());
            }
        }
        default
    }

    /// Serialize and write a document synchronously.
    ///
    /// Updates the cache and clears the dirty flag on success. If the cached
    /// document was mutated while the write was in flight, the newer
    /// in-memory copy is kept and stays dirty.
    ///
    /// # Errors
    ///
    /// Returns the backend's write error, or `Serialization` if `data` cannot
    /// be encoded. The cache is left untouched on failure.
    #[instrument(skip(self, data))]
    pub async fn save<T>(&self, key: &str, data: &T) -> StoreResult<()>
    where
        T: Serialize + ?Sized,
    {
        let value = encode(key, data)?;
        let bytes = to_bytes(key, &value)?;

        let _gate = self.inner.write_gate.lock().await;
        let seen = self.inner.state.lock().revision(key);
        if let Err(e) = self.inner.backend.write(key, &bytes).await {
            error!(error = %e, "Failed to save document");
            return Err(e);
        }
        if !self.commit(key, value, seen) {
            debug!("Document changed during save, keeping newer in-memory copy");
        }

        debug!(size = bytes.len(), "Saved document");
        Ok(())
    }

    /// Apply `mutate` to a cached document and mark it dirty.
    ///
    /// The write is deferred to the next flush. `mutate` runs while the cache
    /// lock is held and must not call back into the store.
    ///
    /// # Errors
    ///
    /// `NotCached` if `key` was never loaded; `Serialization` if the cached
    /// document does not decode as `T`.
    #[instrument(skip(self, mutate))]
    pub fn update<T, F>(&self, key: &str, mutate: F) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(T) -> T,
    {
        let mut state = self.inner.state.lock();
        let current = state
            .entries
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::new(StoreErrorKind::NotCached(key.to_string())))?;

        let next = mutate(decode(key, current)?);
        let value = encode(key, &next)?;
        state.set(key, value);
        state.dirty.insert(key.to_string());

        debug!("Updated cached document");
        Ok(next)
    }

    /// Replace a cached document wholesale and mark it dirty.
    ///
    /// # Errors
    ///
    /// `NotCached` if `key` was never loaded.
    #[instrument(skip(self, data))]
    pub fn replace<T>(&self, key: &str, data: T) -> StoreResult<T>
    where
        T: Serialize,
    {
        let value = encode(key, &data)?;
        let mut state = self.inner.state.lock();
        if !state.entries.contains_key(key) {
            return Err(StoreError::new(StoreErrorKind::NotCached(key.to_string())));
        }
        state.set(key, value);
        state.dirty.insert(key.to_string());

        debug!("Replaced cached document");
        Ok(data)
    }

    /// Read-modify-write with an immediate write, retrying on failure.
    ///
    /// Uses the configured `max_retries` and `retry_backoff_ms`.
    /// See [`atomic_update_with_retries`](Self::atomic_update_with_retries).
    pub async fn atomic_update<T, F>(&self, key: &str, mutate: F) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned + Default,
        F: Fn(T) -> T,
    {
        let max_retries = *self.inner.config.max_retries();
        self.atomic_update_with_retries(key, max_retries, mutate)
            .await
    }

    /// Read-modify-write with an immediate write, retrying on failure.
    ///
    /// Each attempt starts from the latest local state: the cached document
    /// if it has unflushed changes, otherwise the persisted document read
    /// fresh (a missing document reads as `T::default()`). It applies
    /// `mutate` and writes synchronously. Attempt `n` that fails waits
    /// `n * retry_backoff` before the next one. On success the cache holds
    /// the written document and the key is clean.
    ///
    /// If the cached document is mutated while an attempt is writing, that
    /// attempt counts as failed and the next one starts from the newer copy.
    ///
    /// # Errors
    ///
    /// - `RetryExhausted` after `max_retries` failed attempts; the last
    ///   failure is its [`source`](std::error::Error::source).
    /// - `Serialization` immediately, without retrying, if the document is
    ///   not valid for `T`. The document is left as is.
    #[instrument(skip(self, mutate))]
    pub async fn atomic_update_with_retries<T, F>(
        &self,
        key: &str,
        max_retries: u32,
        mutate: F,
    ) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned + Default,
        F: Fn(T) -> T,
    {
        let attempts = max_retries.max(1);
        let step = self.inner.config.retry_backoff();
        let strategy = (1..attempts).map(move |attempt| step * attempt);

        let store = self;
        let mutate = &mutate;
        let mut attempt = 0u32;

        let _gate = self.inner.write_gate.lock().await;
        let result = Retry::spawn(strategy, || {
            attempt += 1;
            let current = attempt;
            async move {
                store.try_atomic_update(key, mutate).await.map_err(|e| {
                    if e.is_transient() {
                        warn!(attempt = current, error = %e, "Atomic update attempt failed");
                        RetryError::Transient {
                            err: e,
                            retry_after: None,
                        }
                    } else {
                        warn!(attempt = current, error = %e, "Atomic update failed permanently");
                        RetryError::Permanent(e)
                    }
                })
            }
        })
        .await;

        match result {
            Ok(next) => Ok(next),
            Err(e) if e.is_transient() => {
                error!(attempts, error = %e, "Atomic update exhausted its retries");
                Err(StoreError::retry_exhausted(key, attempts, e))
            }
            Err(e) => Err(e),
        }
    }

    async fn try_atomic_update<T, F>(&self, key: &str, mutate: &F) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned + Default,
        F: Fn(T) -> T,
    {
        let (pending, seen) = {
            let state = self.inner.state.lock();
            (state.pending(key), state.revision(key))
        };

        let current = match pending {
            Some(value) => {
                debug!("Applying atomic update on top of unflushed changes");
                decode(key, value)?
            }
            None => match self.inner.backend.read(key).await? {
                Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                    StoreError::new(StoreErrorKind::Serialization(format!("{}: {}", key, e)))
                })?,
                None => T::default(),
            },
        };

        let next = mutate(current);
        let value = encode(key, &next)?;
        let bytes = to_bytes(key, &value)?;
        self.inner.backend.write(key, &bytes).await?;
        if !self.commit(key, value, seen) {
            return Err(StoreError::new(StoreErrorKind::Conflict(key.to_string())));
        }

        debug!("Atomically updated document");
        Ok(next)
    }

    /// Mark a key dirty without loading it.
    ///
    /// A dirty key with no cached document is dropped by the next flush.
    pub fn mark_dirty(&self, key: &str) {
        let mut state = self.inner.state.lock();
        state.dirty.insert(key.to_string());
        state.touch(key);
        drop(state);
        debug!(key, "Marked document dirty");
    }

    /// Flush every dirty document.
    ///
    /// The dirty set is taken and cleared in one step before any write, so
    /// keys dirtied while the flush runs stay dirty for the next pass. A key
    /// whose write fails is marked dirty again.
    ///
    /// # Returns
    ///
    /// The number of documents written.
    ///
    /// # Errors
    ///
    /// The first write error, after every other document has been attempted.
    #[instrument(skip(self))]
    pub async fn save_dirty_files(&self) -> StoreResult<usize> {
        let _gate = self.inner.write_gate.lock().await;

        let batch: Vec<(String, Value)> = {
            let mut state = self.inner.state.lock();
            if state.dirty.is_empty() {
                return Ok(0);
            }
            let keys = std::mem::take(&mut state.dirty);
            keys.into_iter()
                .filter_map(|key| {
                    let value = state.entries.get(&key).cloned()?;
                    Some((key, value))
                })
                .collect()
        };

        let mut flushed = 0;
        let mut first_error = None;
        for (key, value) in batch {
            let written = match to_bytes(&key, &value) {
                Ok(bytes) => self.inner.backend.write(&key, &bytes).await,
                Err(e) => Err(e),
            };

            match written {
                Ok(()) => flushed += 1,
                Err(e) => {
                    error!(key = %key, error = %e, "Failed to flush document");
                    self.inner.state.lock().dirty.insert(key);
                    first_error.get_or_insert(e);
                }
            }
        }

        if flushed > 0 {
            debug!(flushed, "Flushed dirty documents");
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(flushed),
        }
    }

    /// Copy the persisted bytes of `key` to `<key>.backup.<timestamp>`.
    ///
    /// # Returns
    ///
    /// The key of the backup document.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing is persisted under `key`, or the backend's read
    /// or write error.
    #[instrument(skip(self))]
    pub async fn backup(&self, key: &str) -> StoreResult<String> {
        let _gate = self.inner.write_gate.lock().await;

        let bytes = match self.inner.backend.read(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                let e = StoreError::new(StoreErrorKind::NotFound(key.to_string()));
                error!(error = %e, "Failed to create backup");
                return Err(e);
            }
            Err(e) => {
                error!(error = %e, "Failed to create backup");
                return Err(e);
            }
        };

        let target = backup_key(key, Utc::now());
        if let Err(e) = self.inner.backend.write(&target, &bytes).await {
            error!(error = %e, "Failed to create backup");
            return Err(e);
        }

        debug!(backup = %target, "Created backup");
        Ok(target)
    }

    /// Cached copy of a document, without touching storage.
    pub fn get_cached<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let value = self.inner.state.lock().entries.get(key).cloned()?;
        decode(key, value)
            .inspect_err(|e| warn!(key, error = %e, "Cached document has unexpected shape"))
            .ok()
    }

    /// Whether `key` is held in memory.
    pub fn is_cached(&self, key: &str) -> bool {
        self.inner.state.lock().entries.contains_key(key)
    }

    /// Whether `key` has unflushed mutations.
    pub fn is_dirty(&self, key: &str) -> bool {
        self.inner.state.lock().dirty.contains(key)
    }

    /// Cache size, dirty count and approximate serialized size.
    pub fn stats(&self) -> StoreStats {
        let state = self.inner.state.lock();
        let values: Vec<&Value> = state.entries.values().collect();
        let approximate_bytes = serde_json::to_vec(&values)
            .map(|bytes| bytes.len())
            .unwrap_or(0);

        StoreStats {
            cached_documents: state.entries.len(),
            dirty_documents: state.dirty.len(),
            approximate_bytes,
        }
    }

    /// Cache a value just written, unless the key changed in memory since
    /// revision `seen`. Returns whether the value was cached.
    fn commit(&self, key: &str, value: Value, seen: u64) -> bool {
        let mut state = self.inner.state.lock();
        if state.revision(key) != seen {
            return false;
        }
        state.set(key, value);
        state.dirty.remove(key);
        true
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CacheStore")
            .field("backend", &self.inner.backend.name())
            .field("cached", &state.entries.len())
            .field("dirty", &state.dirty.len())
            .finish()
    }
}

/// Key of the backup written for `key` at time `at`.
///
/// The timestamp is RFC 3339 with millisecond precision, with `:` and `.`
/// replaced by `-`.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use linkfix_store::backup_key;
///
/// let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
/// assert_eq!(
///     backup_key("rpg/players.json", at),
///     "rpg/players.json.backup.2024-01-02T03-04-05-000Z"
/// );
/// ```
pub fn backup_key(key: &str, at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}.backup.{}", key, stamp)
}

fn encode<T>(key: &str, data: &T) -> StoreResult<Value>
where
    T: Serialize + ?Sized,
{
    serde_json::to_value(data)
        .map_err(|e| StoreError::new(StoreErrorKind::Serialization(format!("{}: {}", key, e))))
}

fn decode<T>(key: &str, value: Value) -> StoreResult<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(value)
        .map_err(|e| StoreError::new(StoreErrorKind::Serialization(format!("{}: {}", key, e))))
}

fn to_bytes(key: &str, value: &Value) -> StoreResult<Vec<u8>> {
    serde_json::to_vec_pretty(value)
        .map_err(|e| StoreError::new(StoreErrorKind::Serialization(format!("{}: {}", key, e))))
}

fn decode_or_default<T>(key: &str, value: Value, default: T) -> T
where
    T: DeserializeOwned,
{
    decode(key, value).unwrap_or_else(|e| {
        warn!(key, error = %e, "Document does not match expected shape, using default");
        default
    })
}
