//! Statehub Inspector Server
//!
//! Loads configuration, restores persisted namespaces and serves the
//! read-only inspector API.
//!
//! Run with: cargo run --bin statehub [-- path/to/config.toml]
//!
//! # Configuration
//!
//! Without an explicit path the config is searched in the default
//! locations (see [`statehub::config::Config::load_default`]). `STATEHUB_*`
//! environment variables override file settings; `RUST_LOG` overrides the
//! log filter.

use anyhow::Context;
use statehub::config::{Config, LoggingConfig};
use statehub::inspector::{serve, InspectorState};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => Config::load_with_env(&path)?,
        None => Config::load_default(),
    };

    init_tracing(&config.logging);

    tracing::info!("Starting Statehub v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Data directory: {:?}", config.data_dir());

    let store = config
        .build_store()
        .context("failed to initialise persistence adapters")?;

    tracing::info!(
        namespaces = store.get_namespaces().len(),
        adapters = ?store.adapter_names(),
        debug = store.is_debug(),
        "State store ready"
    );

    let inspector_config = config.inspector_config();
    serve(InspectorState::new(store, inspector_config.clone()), &inspector_config).await?;

    tracing::info!("Statehub stopped");
    Ok(())
}

/// Initialise tracing from the logging section.
///
/// `RUST_LOG` wins over `logging.level`. With `logging.file` set, output is
/// appended to that file instead of stderr.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("statehub={},tower_http=info", logging.level).into());

    let writer = logging.file.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("Cannot open log file {}: {}", path, e))
            .ok()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match (logging.format.as_str(), writer) {
        ("json", Some(file)) => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init(),
        ("json", None) => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        (_, Some(file)) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
            .init(),
        (_, None) => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
