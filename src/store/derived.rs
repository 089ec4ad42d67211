//! Derived values
//!
//! A derived value is a plain key in a namespace that is recomputed from
//! the namespace whenever one of its dependency keys changes. The result is
//! written back through the normal `set` path, so it notifies and persists
//! like any other write.
//!
//! A derived value that is asked to recompute while it is already
//! recomputing is part of a dependency cycle; the nested request is
//! skipped so the cycle terminates.

use serde_json::{Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::engine::{SetOptions, WeakStateStore};
use super::subscription::panic_message;

/// Computes a derived value from the current namespace state
pub type ComputeFn = Arc<dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync>;

/// Public description of a registered derived value
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DerivedInfo {
    pub namespace: String,
    pub key: String,
    pub dependencies: Vec<String>,
}

pub(crate) struct DerivedValue {
    pub namespace: String,
    pub key: String,
    pub dependencies: Vec<String>,
    compute: ComputeFn,
    computing: AtomicBool,
}

impl DerivedValue {
    pub fn new(namespace: &str, key: &str, dependencies: Vec<String>, compute: ComputeFn) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            dependencies,
            compute,
            computing: AtomicBool::new(false),
        }
    }

    pub fn info(&self) -> DerivedInfo {
        DerivedInfo {
            namespace: self.namespace.clone(),
            key: self.key.clone(),
            dependencies: self.dependencies.clone(),
        }
    }

    /// Run the compute function with panic isolation
    pub fn evaluate(&self, state: &Value) -> Result<Value, String> {
        match catch_unwind(AssertUnwindSafe(|| (self.compute)(state))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(panic_message(panic.as_ref())),
        }
    }

    /// Recompute and write the result back into the store
    pub fn recompute(&self, store: &WeakStateStore) {
        let Some(store) = store.upgrade() else {
            return;
        };

        if self.computing.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                namespace = %self.namespace,
                key = %self.key,
                "Derived value re-entered while recomputing (dependency cycle), skipping"
            );
            return;
        }

        let state = store.get_all(&self.namespace);
        match self.evaluate(&state) {
            Ok(value) => {
                let mut update = Map::new();
                update.insert(self.key.clone(), value);
                let written = store.set(&self.namespace, Value::Object(update), SetOptions::default());
                if let Err(e) = written {
                    tracing::error!(
                        namespace = %self.namespace,
                        key = %self.key,
                        error = %e,
                        "Failed to write derived value"
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    namespace = %self.namespace,
                    key = %self.key,
                    error = %e,
                    "Derived value computation failed"
                );
            }
        }

        self.computing.store(false, Ordering::SeqCst);
    }
}
