//! Inspector State
//!
//! Shared state accessible by all inspector handlers.

use std::sync::Arc;
use std::time::Instant;

use crate::store::StateStore;

/// Shared state for all handlers
#[derive(Clone)]
pub struct InspectorState {
    /// Store being inspected
    pub store: StateStore,
    /// Inspector configuration
    pub config: Arc<InspectorConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl InspectorState {
    pub fn new(store: StateStore, config: InspectorConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Inspector server configuration
#[derive(Debug, Clone)]
pub struct InspectorConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Largest history page a client may request
    pub max_history: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8085,
            max_history: 1000,
        }
    }
}

impl InspectorConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
