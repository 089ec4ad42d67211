//! # Statehub
//!
//! Reactive, namespace-scoped state store for dashboard shells.
//!
//! ## Features
//!
//! - **Namespaces**: independent key/value partitions, created on first use
//! - **Subscriptions**: key filters with dot-path matching (`user` sees `user.name`)
//! - **Transactions**: batch many writes into one notification per namespace
//! - **Derived values**: keys recomputed from their dependencies
//! - **Persistence**: pluggable adapters (memory, local files, session, cookies)
//! - **Inspector**: read-only HTTP view of snapshots and history
//!
//! ## Modules
//!
//! - [`store`]: Core state store
//! - [`persistence`]: Storage adapters
//! - [`binding`]: Per-component facade
//! - [`inspector`]: REST inspector with Axum
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use statehub::store::{SetOptions, StateChange, StateStore};
//!
//! let store = StateStore::in_memory();
//!
//! store.subscribe_keys("cart", ["qty"], |change: &StateChange| {
//!     println!("qty is now {:?}", change.get("qty"));
//! });
//!
//! store.set("cart", json!({"qty": 2, "price": 10}), SetOptions::default()).unwrap();
//! store
//!     .create_derived_state("cart", "total", ["qty", "price"], |s| {
//!         Ok(json!(s["qty"].as_i64().unwrap_or(0) * s["price"].as_i64().unwrap_or(0)))
//!     })
//!     .unwrap();
//!
//! assert_eq!(store.get("cart", "total"), Some(json!(20)));
//! ```

pub mod binding;
pub mod config;
pub mod inspector;
pub mod persistence;
pub mod store;

// Re-export top-level types for convenience
pub use store::{
    ChangeKind, SetOptions, StateChange, StateStore, StoreConfig, StoreError, StoreResult,
    SubscriptionId, Transaction,
};

pub use persistence::{
    AdapterRegistry, PersistenceAdapter, PersistenceError, PersistenceOptions, PersistenceResult,
    StorageType,
};

pub use binding::{connect, ComponentBinding, ConnectOptions, InputEvent, InputKind};

pub use inspector::{build_router, serve, InspectorConfig, InspectorError, InspectorState};

pub use config::{Config, ConfigError, LoggingConfig};
