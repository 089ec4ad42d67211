//! In-memory adapter
//!
//! Values are held as JSON text so a write goes through the same
//! encode/decode path as the durable adapters.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{PersistenceAdapter, PersistenceError, PersistenceResult, WriteOptions};

/// Process-local key/value adapter
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> PersistenceResult<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| PersistenceError::Lock(format!("Failed to lock memory adapter: {}", e)))
    }
}

impl PersistenceAdapter for MemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> PersistenceResult<Option<Value>> {
        let entries = self.lock()?;
        match entries.get(key) {
            Some(text) => Ok(Some(serde_json::from_str(text)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &Value, _options: &WriteOptions) -> PersistenceResult<()> {
        let text = serde_json::to_string(value)?;
        self.lock()?.insert(key.to_string(), text);
        Ok(())
    }

    fn remove(&self, key: &str) -> PersistenceResult<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn exists(&self, key: &str) -> PersistenceResult<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    fn keys(&self) -> PersistenceResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}
