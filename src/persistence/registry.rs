//! Adapter registry
//!
//! Maps adapter names to shared adapter instances.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::{
    CookieAdapter, LocalStorageAdapter, MemoryAdapter, PersistenceAdapter, PersistenceResult,
    SessionStorageAdapter,
};

/// Named set of persistence adapters
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn PersistenceAdapter>>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all four built-in adapters; `local` writes under `data_dir`
    pub fn with_defaults(data_dir: &Path) -> PersistenceResult<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(MemoryAdapter::new()));
        registry.register(Arc::new(LocalStorageAdapter::new(data_dir)?));
        registry.register(Arc::new(SessionStorageAdapter::new()));
        registry.register(Arc::new(CookieAdapter::new()));
        Ok(registry)
    }

    /// Registry with the built-ins, but `local` backed by memory.
    ///
    /// Used when no data directory is available.
    pub fn in_memory() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MemoryAdapter::new()));
        registry.register_as("local", Arc::new(MemoryAdapter::new()));
        registry.register(Arc::new(SessionStorageAdapter::new()));
        registry.register(Arc::new(CookieAdapter::new()));
        registry
    }

    /// Register an adapter under its own name, replacing any previous one
    pub fn register(&mut self, adapter: Arc<dyn PersistenceAdapter>) {
        let name = adapter.name().to_string();
        self.register_as(&name, adapter);
    }

    /// Register an adapter under an explicit name
    pub fn register_as(&mut self, name: &str, adapter: Arc<dyn PersistenceAdapter>) {
        if self.adapters.insert(name.to_string(), adapter).is_some() {
            tracing::debug!(adapter = %name, "Replaced persistence adapter");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PersistenceAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// Registered adapter names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_registered() {
        let dir = tempdir().unwrap();
        let registry = AdapterRegistry::with_defaults(dir.path()).unwrap();
        assert_eq!(registry.names(), vec!["cookie", "local", "memory", "session"]);
    }

    #[test]
    fn test_in_memory_local_alias() {
        let registry = AdapterRegistry::in_memory();
        let local = registry.get("local").unwrap();
        assert_eq!(local.name(), "memory");
        assert!(registry.contains("cookie"));
        assert!(registry.get("floppy").is_none());
    }

    #[test]
    fn test_register_custom() {
        let mut registry = AdapterRegistry::new();
        registry.register_as("scratch", Arc::new(MemoryAdapter::new()));
        assert_eq!(registry.names(), vec!["scratch"]);
    }
}
