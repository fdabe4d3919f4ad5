//! In-memory document backend.

use crate::DocumentBackend;
use linkfix_error::StoreResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Document backend that keeps bytes in a map.
///
/// Cloning shares the underlying map, so a test can keep a handle and inspect
/// what the store persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    documents: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw bytes under `key`, bypassing any store.
    pub fn insert_raw(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.documents.lock().insert(key.into(), bytes.into());
    }

    /// Raw bytes currently stored under `key`.
    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.documents.lock().get(key).cloned()
    }

    /// Stored bytes parsed as JSON, if present and valid.
    pub fn get_json(&self, key: &str) -> Option<serde_json::Value> {
        self.get_raw(key)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.documents.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait::async_trait]
impl DocumentBackend for MemoryBackend {
    async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.get_raw(key))
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        self.documents.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
