//! Session-scoped adapter
//!
//! Lives exactly as long as the adapter instance. Each instance carries a
//! fresh session id so logs can tell sessions apart.

use serde_json::Value;
use uuid::Uuid;

use super::{MemoryAdapter, PersistenceAdapter, PersistenceResult, WriteOptions};

/// Adapter whose contents are discarded when the session ends
#[derive(Debug)]
pub struct SessionStorageAdapter {
    session_id: String,
    inner: MemoryAdapter,
}

impl SessionStorageAdapter {
    pub fn new() -> Self {
        let session_id = Uuid::new_v4().to_string();
        tracing::debug!(session_id = %session_id, "Session storage opened");
        Self {
            session_id,
            inner: MemoryAdapter::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Drop everything stored in this session
    pub fn end_session(&self) -> PersistenceResult<usize> {
        let removed = self.inner.clear_namespace("")?;
        tracing::debug!(session_id = %self.session_id, removed, "Session storage cleared");
        Ok(removed)
    }
}

impl Default for SessionStorageAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceAdapter for SessionStorageAdapter {
    fn name(&self) -> &str {
        "session"
    }

    fn get(&self, key: &str) -> PersistenceResult<Option<Value>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &Value, options: &WriteOptions) -> PersistenceResult<()> {
        self.inner.set(key, value, options)
    }

    fn remove(&self, key: &str) -> PersistenceResult<bool> {
        self.inner.remove(key)
    }

    fn exists(&self, key: &str) -> PersistenceResult<bool> {
        self.inner.exists(key)
    }

    fn keys(&self) -> PersistenceResult<Vec<String>> {
        self.inner.keys()
    }
}
