//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::inspector::InspectorConfig;
use crate::persistence::{AdapterRegistry, PersistenceOptions, PersistenceResult};
use crate::store::{StateStore, StoreConfig, DEFAULT_HISTORY_LIMIT};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,

    #[serde(default)]
    pub inspector: InspectorSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_storage_prefix")]
    pub storage_prefix: String,

    #[serde(default = "default_adapter")]
    pub default_adapter: String,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_storage_prefix() -> String {
    "statehub_".to_string()
}

fn default_adapter() -> String {
    "local".to_string()
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            debug: false,
            storage_prefix: default_storage_prefix(),
            default_adapter: default_adapter(),
            history_limit: default_history_limit(),
        }
    }
}

/// Persistence adapters and persisted namespaces
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceSettings {
    /// Directory used by the `local` adapter
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Namespaces restored at startup and persisted on change
    #[serde(default)]
    pub namespaces: Vec<PersistedNamespace>,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("statehub").to_string_lossy().to_string())
        .unwrap_or_else(|| "./statehub_data".to_string())
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            namespaces: Vec::new(),
        }
    }
}

/// One `[[persistence.namespaces]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct PersistedNamespace {
    pub name: String,

    /// Adapter name; falls back to `store.default_adapter`
    #[serde(rename = "type", default)]
    pub adapter: Option<String>,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub include: Option<Vec<String>>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Cookie lifetime in days (cookie adapter only)
    #[serde(default)]
    pub max_age_days: Option<i64>,

    /// Cookie path (cookie adapter only)
    #[serde(default)]
    pub path: Option<String>,
}

impl PersistedNamespace {
    pub fn options(&self) -> PersistenceOptions {
        PersistenceOptions {
            adapter: self.adapter.clone(),
            key: self.key.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            max_age_days: self.max_age_days,
            path: self.path.clone(),
        }
    }
}

/// Inspector server
#[derive(Debug, Clone, Deserialize)]
pub struct InspectorSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8085
}

fn default_max_history() -> usize {
    1000
}

impl Default for InspectorSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_history: default_max_history(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("statehub").join("config.toml")),
            Some(PathBuf::from("/etc/statehub/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `STATEHUB_*` overrides read through `lookup`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = lookup("STATEHUB_DATA_DIR") {
            self.persistence.data_dir = data_dir;
        }

        if let Some(host) = lookup("STATEHUB_INSPECTOR_HOST") {
            self.inspector.host = host;
        }
        if let Some(port) = lookup("STATEHUB_INSPECTOR_PORT") {
            match port.parse() {
                Ok(p) => self.inspector.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid STATEHUB_INSPECTOR_PORT"),
            }
        }

        if let Some(debug) = lookup("STATEHUB_DEBUG") {
            self.store.debug = matches!(
                debug.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        if let Some(level) = lookup("STATEHUB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("STATEHUB_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Data directory with a leading `~` expanded
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.persistence.data_dir)
    }

    /// Store settings plus the namespaces to restore
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            storage_prefix: self.store.storage_prefix.clone(),
            default_adapter: self.store.default_adapter.clone(),
            debug: self.store.debug,
            history_limit: self.store.history_limit,
            persisted: self
                .persistence
                .namespaces
                .iter()
                .map(|ns| (ns.name.clone(), ns.options()))
                .collect(),
        }
    }

    /// Built-in adapters, with `local` rooted at the data directory
    pub fn adapter_registry(&self) -> PersistenceResult<AdapterRegistry> {
        AdapterRegistry::with_defaults(&self.data_dir())
    }

    /// Construct a store from this configuration, restoring persisted namespaces
    pub fn build_store(&self) -> PersistenceResult<StateStore> {
        Ok(StateStore::new(self.store_config(), self.adapter_registry()?))
    }

    pub fn inspector_config(&self) -> InspectorConfig {
        InspectorConfig {
            host: self.inspector.host.clone(),
            port: self.inspector.port,
            max_history: self.inspector.max_history,
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Statehub Configuration
#
# Environment variables override these settings:
# - STATEHUB_DATA_DIR
# - STATEHUB_INSPECTOR_HOST
# - STATEHUB_INSPECTOR_PORT
# - STATEHUB_DEBUG
# - STATEHUB_LOG_LEVEL
# - STATEHUB_LOG_FORMAT

[store]
# Record change history and log every change
debug = false

# Prefix for default storage keys (prefix + namespace)
storage_prefix = "statehub_"

# Adapter used when a persisted namespace does not name one:
# memory, local, session or cookie
default_adapter = "local"

# History entries kept per namespace (debug mode only)
history_limit = 100

[persistence]
# Directory for the local adapter
data_dir = "~/.local/share/statehub"

# Namespaces restored at startup and written on every change
# [[persistence.namespaces]]
# name = "preferences"
# type = "local"
# key = "statehub_preferences"
# include = ["theme", "language"]
# exclude = []
# max_age_days = 30   # cookie adapter only
# path = "/"          # cookie adapter only

[inspector]
# Inspector server host
host = "127.0.0.1"

# Inspector server port
port = 8085

# Largest history page a client may request
max_history = 1000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/statehub/statehub.log"
"#
    .to_string()
}
