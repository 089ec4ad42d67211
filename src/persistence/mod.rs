//! Pluggable Persistence
//!
//! The store never talks to a storage medium directly. Every durable write
//! goes through a [`PersistenceAdapter`] looked up by name in an
//! [`AdapterRegistry`].
//!
//! Four adapters ship by default:
//!
//! - **memory**: process-local map, serialised as JSON text
//! - **local**: one JSON file per key in a data directory (survives restarts)
//! - **session**: process-local, discarded with the adapter, tagged with a session id
//! - **cookie**: cookie-jar semantics with expiry and a per-cookie size limit
//!
//! Persistence is a best-effort cache. Adapter failures are reported to the
//! caller of the adapter, and the store logs them without touching
//! in-memory state.

mod cookie;
mod error;
mod local;
mod memory;
mod registry;
mod session;

pub use cookie::{CookieAdapter, MAX_COOKIE_BYTES};
pub use error::{PersistenceError, PersistenceResult};
pub use local::LocalStorageAdapter;
pub use memory::MemoryAdapter;
pub use registry::AdapterRegistry;
pub use session::SessionStorageAdapter;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-write hints. Only the cookie adapter reads them today.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Lifetime in days; `None` uses the adapter default
    pub max_age_days: Option<i64>,
    /// Cookie path; `None` uses `/`
    pub path: Option<String>,
}

/// Uniform contract over a storage backend
pub trait PersistenceAdapter: Send + Sync {
    /// Registry name of this adapter
    fn name(&self) -> &str;

    /// Read a stored value; `Ok(None)` when absent
    fn get(&self, key: &str) -> PersistenceResult<Option<Value>>;

    /// Store a value under `key`, replacing any previous value
    fn set(&self, key: &str, value: &Value, options: &WriteOptions) -> PersistenceResult<()>;

    /// Remove a key; returns whether it existed
    fn remove(&self, key: &str) -> PersistenceResult<bool>;

    /// Whether a value is stored under `key`
    fn exists(&self, key: &str) -> PersistenceResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All stored keys, sorted
    fn keys(&self) -> PersistenceResult<Vec<String>>;

    /// Remove every key starting with `prefix`; returns how many were removed
    fn clear_namespace(&self, prefix: &str) -> PersistenceResult<usize> {
        let mut removed = 0;
        for key in self.keys()?.into_iter().filter(|k| k.starts_with(prefix)) {
            if self.remove(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Built-in adapter kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Memory,
    Local,
    Session,
    Cookie,
}

impl StorageType {
    /// Registry name for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Memory => "memory",
            StorageType::Local => "local",
            StorageType::Session => "session",
            StorageType::Cookie => "cookie",
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageType::Memory),
            "local" | "localstorage" | "local_storage" => Ok(StorageType::Local),
            "session" | "sessionstorage" | "session_storage" => Ok(StorageType::Session),
            "cookie" | "cookies" => Ok(StorageType::Cookie),
            _ => Err(format!("Unknown storage type: {}", s)),
        }
    }
}

/// Caller-facing options for `configure_persistence`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersistenceOptions {
    /// Adapter name; `None` uses the store default
    #[serde(default, rename = "type")]
    pub adapter: Option<String>,
    /// Storage key; `None` uses prefix + namespace
    #[serde(default)]
    pub key: Option<String>,
    /// Only these top-level keys are persisted
    #[serde(default)]
    pub include: Option<Vec<String>>,
    /// These top-level keys are never persisted
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Cookie lifetime in days
    #[serde(default)]
    pub max_age_days: Option<i64>,
    /// Cookie path
    #[serde(default)]
    pub path: Option<String>,
}

impl PersistenceOptions {
    pub fn new(storage: StorageType) -> Self {
        Self {
            adapter: Some(storage.as_str().to_string()),
            ..Default::default()
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn include<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_age_days(mut self, days: i64) -> Self {
        self.max_age_days = Some(days);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Resolved per-namespace persistence configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistenceConfig {
    pub adapter: String,
    pub storage_key: String,
    pub include: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub max_age_days: Option<i64>,
    pub path: Option<String>,
}

impl PersistenceConfig {
    /// Adapter hints passed with every write of this namespace
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            max_age_days: self.max_age_days,
            path: self.path.clone(),
        }
    }

    /// Select the top-level keys of `state` that should be written
    pub fn filter(&self, state: &Map<String, Value>) -> Map<String, Value> {
        state
            .iter()
            .filter(|(key, _)| {
                self.include
                    .as_ref()
                    .map_or(true, |include| include.iter().any(|k| k == *key))
            })
            .filter(|(key, _)| !self.exclude.iter().any(|k| k == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
