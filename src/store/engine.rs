//! State Store
//!
//! The store orchestrates all components:
//! - Write path: updates → diff (deep equality) → buffer or notify → persist
//! - Read path: namespace → dot path → copy
//!
//! `StateStore` is a cheap, cloneable handle. Internal state sits behind a
//! mutex which is released before any subscriber runs, so callbacks may
//! call back into the store (derived values, shared-key mirroring).

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::persistence::{
    AdapterRegistry, PersistenceAdapter, PersistenceConfig, PersistenceOptions, WriteOptions,
};
use crate::store::derived::{ComputeFn, DerivedInfo, DerivedValue};
use crate::store::error::{StoreError, StoreResult};
use crate::store::history::{History, HistoryEntry, DEFAULT_HISTORY_LIMIT};
use crate::store::path::{self, KeyPath};
use crate::store::subscription::{
    deliver, Callback, ChangeKind, StateChange, SubscriptionId, SubscriptionRegistry,
};
use crate::store::transaction::{Transaction, TransactionState};

/// Configuration for the state store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Prefix for default storage keys (`prefix + namespace`)
    pub storage_prefix: String,
    /// Adapter used when a namespace does not name one
    pub default_adapter: String,
    /// Record history and log every change
    pub debug: bool,
    /// History entries kept per namespace
    pub history_limit: usize,
    /// Namespaces configured for persistence and restored at construction
    pub persisted: Vec<(String, PersistenceOptions)>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_prefix: "statehub_".to_string(),
            default_adapter: "local".to_string(),
            debug: false,
            history_limit: DEFAULT_HISTORY_LIMIT,
            persisted: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Add a namespace to restore and persist
    pub fn persist(mut self, namespace: impl Into<String>, options: PersistenceOptions) -> Self {
        self.persisted.push((namespace.into(), options));
        self
    }
}

/// Options for a single `set`
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Apply without notifying or persisting
    pub silent: bool,
    /// Persist even if the namespace has no persistence configuration
    pub persist: bool,
}

impl SetOptions {
    pub fn silent() -> Self {
        Self {
            silent: true,
            persist: false,
        }
    }

    pub fn persist() -> Self {
        Self {
            silent: false,
            persist: true,
        }
    }
}

/// Summary counters for diagnostics
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub namespaces: usize,
    pub subscriptions: usize,
    pub persisted_namespaces: usize,
    pub derived_values: usize,
    pub transaction_active: bool,
    pub debug: bool,
}

#[derive(Default)]
struct StoreState {
    namespaces: BTreeMap<String, Map<String, Value>>,
    subscriptions: SubscriptionRegistry,
    transaction: TransactionState,
    persistence: HashMap<String, PersistenceConfig>,
    /// Derived values keyed by their internal subscription
    derived: Vec<(SubscriptionId, Arc<DerivedValue>)>,
}

struct StoreInner {
    state: Mutex<StoreState>,
    history: Mutex<History>,
    adapters: Mutex<AdapterRegistry>,
    config: StoreConfig,
    debug: AtomicBool,
}

/// Namespaced reactive key/value store
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

/// Non-owning handle, used by internal subscriptions
#[derive(Clone)]
pub struct WeakStateStore {
    inner: Weak<StoreInner>,
}

impl WeakStateStore {
    pub fn upgrade(&self) -> Option<StateStore> {
        self.inner.upgrade().map(|inner| StateStore { inner })
    }
}

/// Everything needed to write one namespace to its adapter
struct PersistPlan {
    adapter: Arc<dyn PersistenceAdapter>,
    storage_key: String,
    payload: Value,
    options: WriteOptions,
}

impl StateStore {
    /// Create a store and restore every configured namespace from its adapter
    pub fn new(config: StoreConfig, adapters: AdapterRegistry) -> Self {
        let store = Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                history: Mutex::new(History::new(config.history_limit)),
                adapters: Mutex::new(adapters),
                debug: AtomicBool::new(config.debug),
                config,
            }),
        };

        for (namespace, options) in store.inner.config.persisted.clone() {
            if let Err(e) = store.install_persistence(&namespace, options) {
                tracing::warn!(namespace = %namespace, error = %e, "Skipping persisted namespace");
                continue;
            }
            match store.restore_namespace(&namespace) {
                Ok(true) => tracing::info!(namespace = %namespace, "Restored persisted namespace"),
                Ok(false) => tracing::debug!(namespace = %namespace, "No persisted state found"),
                Err(e) => {
                    tracing::warn!(namespace = %namespace, error = %e, "Failed to restore namespace")
                }
            }
        }

        store
    }

    /// Store with default settings and memory-backed adapters
    pub fn in_memory() -> Self {
        Self::new(StoreConfig::default(), AdapterRegistry::in_memory())
    }

    pub fn downgrade(&self) -> WeakStateStore {
        WeakStateStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Copy of the value at `key` (dot paths allowed); `None` if any segment is absent
    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let mut state = self.lock();
        let ns = state.namespaces.entry(namespace.to_string()).or_default();
        path::lookup_in(ns, &KeyPath::parse(key)).cloned()
    }

    /// Copy of the whole namespace
    pub fn get_all(&self, namespace: &str) -> Value {
        let mut state = self.lock();
        let ns = state.namespaces.entry(namespace.to_string()).or_default();
        Value::Object(ns.clone())
    }

    /// Whether `key` resolves to a value
    pub fn has(&self, namespace: &str, key: &str) -> bool {
        let state = self.lock();
        state
            .namespaces
            .get(namespace)
            .is_some_and(|ns| path::lookup_in(ns, &KeyPath::parse(key)).is_some())
    }

    /// Copy of the namespace, for save/restore round-trips
    pub fn export_state(&self, namespace: &str) -> Value {
        let state = self.lock();
        Value::Object(state.namespaces.get(namespace).cloned().unwrap_or_default())
    }

    /// Copy of the entire state tree
    pub fn get_snapshot(&self) -> Value {
        let state = self.lock();
        Value::Object(
            state
                .namespaces
                .iter()
                .map(|(name, ns)| (name.clone(), Value::Object(ns.clone())))
                .collect(),
        )
    }

    /// Whether a namespace exists, without creating it
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.lock().namespaces.contains_key(namespace)
    }

    /// Names of all known namespaces, sorted
    pub fn get_namespaces(&self) -> Vec<String> {
        self.lock().namespaces.keys().cloned().collect()
    }

    /// Recorded changes for a namespace, oldest first
    pub fn get_history(&self, namespace: &str, limit: Option<usize>) -> Vec<HistoryEntry> {
        self.history().recent(namespace, limit)
    }

    pub fn set_debug(&self, enabled: bool) {
        self.inner.debug.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "State debug mode changed");
    }

    pub fn is_debug(&self) -> bool {
        self.inner.debug.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.lock();
        StoreStats {
            namespaces: state.namespaces.len(),
            subscriptions: state.subscriptions.total(),
            persisted_namespaces: state.persistence.len(),
            derived_values: state.derived.len(),
            transaction_active: state.transaction.active,
            debug: self.is_debug(),
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Apply `updates` (a JSON object) to a namespace and return a copy of it.
    ///
    /// Keys whose new value equals the current value are dropped from the
    /// diff. An empty diff notifies nobody and persists nothing.
    ///
    /// The update is applied as a whole: if any dotted key cannot be written
    /// (an out-of-range array index), the namespace is left untouched.
    pub fn set(&self, namespace: &str, updates: Value, options: SetOptions) -> StoreResult<Value> {
        let Value::Object(updates) = updates else {
            tracing::warn!(namespace = %namespace, "Ignoring non-object state update");
            return Err(StoreError::invalid_input(namespace, "updates must be an object"));
        };

        let mut guard = self.lock();
        let state = &mut *guard;
        let ns = state.namespaces.entry(namespace.to_string()).or_default();

        let mut next = ns.clone();
        let mut changes = Map::new();
        for (key, value) in updates {
            let key_path = KeyPath::parse(&key);
            if path::lookup_in(&next, &key_path) == Some(&value) {
                continue;
            }
            let slot = path::slot_mut(&mut next, &key_path).map_err(|e| {
                tracing::warn!(namespace = %namespace, key = %key, error = %e, "Rejected state update");
                StoreError::invalid_input(namespace, format!("cannot write '{}': {}", key, e))
            })?;
            *slot = value.clone();
            changes.insert(key, value);
        }

        if changes.is_empty() {
            return Ok(Value::Object(next));
        }
        *ns = next;
        let current = Value::Object(ns.clone());

        self.record(namespace, ChangeKind::Update, &changes);

        if state.transaction.active {
            state.transaction.buffer(namespace, changes, options.persist);
            return Ok(current);
        }
        if options.silent {
            return Ok(current);
        }

        let touched = path::touched_paths(changes.keys());
        let targets = state.subscriptions.matching(namespace, &touched, false);
        let persist = options.persist || state.persistence.contains_key(namespace);
        drop(guard);

        let change = StateChange {
            namespace: namespace.to_string(),
            kind: ChangeKind::Update,
            changes,
            state: current.clone(),
        };
        deliver(&change, &targets);
        if persist {
            self.write_through(namespace, options.persist);
        }

        Ok(current)
    }

    /// Replace a namespace with `initial` (or empty) and notify every subscriber
    pub fn reset_state(
        &self,
        namespace: &str,
        initial: Option<Value>,
        silent: bool,
    ) -> StoreResult<()> {
        let initial = initial.unwrap_or_else(|| Value::Object(Map::new()));
        self.replace(namespace, initial, silent, ChangeKind::Reset)
    }

    /// Replace a namespace wholesale with `state` and notify every subscriber
    pub fn import_state(&self, namespace: &str, state: Value, silent: bool) -> StoreResult<()> {
        self.replace(namespace, state, silent, ChangeKind::Import)
    }

    fn replace(
        &self,
        namespace: &str,
        value: Value,
        silent: bool,
        kind: ChangeKind,
    ) -> StoreResult<()> {
        let Value::Object(new_state) = value else {
            tracing::warn!(namespace = %namespace, ?kind, "Ignoring non-object namespace state");
            return Err(StoreError::invalid_input(namespace, "state must be an object"));
        };

        let mut guard = self.lock();
        let state = &mut *guard;
        state
            .namespaces
            .insert(namespace.to_string(), new_state.clone());
        self.record(namespace, kind, &new_state);

        if silent {
            return Ok(());
        }
        if state.transaction.active {
            state.transaction.buffer_structural(namespace, kind);
            return Ok(());
        }

        let targets = state
            .subscriptions
            .matching(namespace, &Default::default(), true);
        let persist = state.persistence.contains_key(namespace);
        drop(guard);

        let change = StateChange {
            namespace: namespace.to_string(),
            kind,
            state: Value::Object(new_state.clone()),
            changes: new_state,
        };
        deliver(&change, &targets);
        if persist {
            self.write_through(namespace, false);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Begin buffering writes. While active, nothing is delivered or persisted.
    pub fn start_transaction(&self) -> Transaction {
        if !self.lock().transaction.begin() {
            tracing::warn!("Transaction already active, reusing it");
        }
        Transaction::new(self.clone())
    }

    /// Flush buffered changes: one notification per touched namespace
    pub fn commit_transaction(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(pending) = state.transaction.finish() else {
            tracing::warn!("No active transaction to commit");
            return;
        };

        let mut batches = Vec::with_capacity(pending.len());
        for (namespace, pending) in pending {
            let kind = pending.kind();
            let current = state.namespaces.get(&namespace).cloned().unwrap_or_default();
            let touched = path::touched_paths(pending.changes.keys());
            let targets = state
                .subscriptions
                .matching(&namespace, &touched, kind.is_structural());
            let persist = pending.persist || state.persistence.contains_key(&namespace);
            let changes = if kind.is_structural() {
                current.clone()
            } else {
                pending.changes
            };
            let change = StateChange {
                namespace,
                kind,
                changes,
                state: Value::Object(current),
            };
            batches.push((change, targets, pending.persist, persist));
        }
        drop(guard);

        tracing::debug!(namespaces = batches.len(), "Committing transaction");
        for (change, targets, force, persist) in batches {
            deliver(&change, &targets);
            if persist {
                self.write_through(&change.namespace, force);
            }
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.lock().transaction.active
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Notify `callback` on every change in the namespace
    pub fn subscribe<F>(&self, namespace: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.subscribe_with(namespace, None, Arc::new(callback))
    }

    /// Notify `callback` when any of `keys` (or their ancestors/descendants) change
    pub fn subscribe_keys<F, I, S>(&self, namespace: &str, keys: I, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys.into_iter().map(Into::into).collect();
        self.subscribe_with(namespace, Some(keys), Arc::new(callback))
    }

    /// Register a prepared callback; `keys = None` listens to everything
    pub fn subscribe_with(
        &self,
        namespace: &str,
        keys: Option<Vec<String>>,
        callback: Callback,
    ) -> SubscriptionId {
        let id = self.lock().subscriptions.add(namespace, keys, callback);
        tracing::debug!(namespace = %namespace, subscription_id = %id, "Subscribed");
        id
    }

    /// Remove a subscription; returns whether it existed.
    ///
    /// Takes effect immediately, including for a notification that is
    /// currently being delivered. Removing the subscription of a derived
    /// value unregisters the derived value as well.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let Some(namespace) = state.subscriptions.remove(id) else {
            return false;
        };
        state.derived.retain(|(sub, _)| *sub != id);
        drop(state);

        tracing::debug!(namespace = %namespace, subscription_id = %id, "Unsubscribed");
        true
    }

    pub fn subscription_count(&self, namespace: &str) -> usize {
        self.lock().subscriptions.count(namespace)
    }

    // ------------------------------------------------------------------
    // Derived values
    // ------------------------------------------------------------------

    /// Seed `key` with `compute(namespace)` and keep it up to date whenever
    /// one of `dependencies` changes. Returns the internal subscription id.
    pub fn create_derived_state<F, I, S>(
        &self,
        namespace: &str,
        key: &str,
        dependencies: I,
        compute: F,
    ) -> StoreResult<SubscriptionId>
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let compute: ComputeFn = Arc::new(compute);
        let dependencies: Vec<String> = dependencies.into_iter().map(Into::into).collect();
        let derived = Arc::new(DerivedValue::new(
            namespace,
            key,
            dependencies.clone(),
            compute,
        ));

        let initial = derived
            .evaluate(&self.get_all(namespace))
            .map_err(|reason| {
                tracing::error!(namespace = %namespace, key = %key, error = %reason, "Derived value failed initial computation");
                StoreError::Derive {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    reason,
                }
            })?;

        let mut seed = Map::new();
        seed.insert(key.to_string(), initial);
        self.set(namespace, Value::Object(seed), SetOptions::silent())?;

        let weak = self.downgrade();
        let entry = Arc::clone(&derived);
        let id = self.subscribe_keys(namespace, dependencies, move |_change: &StateChange| {
            entry.recompute(&weak);
        });

        self.lock().derived.push((id, derived));
        tracing::debug!(namespace = %namespace, key = %key, subscription_id = %id, "Derived value registered");
        Ok(id)
    }

    /// Derived values registered on a namespace, in registration order
    pub fn derived_values(&self, namespace: &str) -> Vec<DerivedInfo> {
        self.lock()
            .derived
            .iter()
            .filter(|(_, d)| d.namespace == namespace)
            .map(|(_, d)| d.info())
            .collect()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Register an additional adapter (replaces one with the same name)
    pub fn register_adapter(&self, adapter: Arc<dyn PersistenceAdapter>) {
        self.adapters().register(adapter);
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters().names()
    }

    /// Install or update a namespace's persistence config and persist it now
    pub fn configure_persistence(
        &self,
        namespace: &str,
        options: PersistenceOptions,
    ) -> StoreResult<()> {
        let config = self.install_persistence(namespace, options)?;
        tracing::info!(
            namespace = %namespace,
            adapter = %config.adapter,
            storage_key = %config.storage_key,
            "Persistence configured"
        );
        self.write_through(namespace, false);
        Ok(())
    }

    fn install_persistence(
        &self,
        namespace: &str,
        options: PersistenceOptions,
    ) -> StoreResult<PersistenceConfig> {
        let adapter = options
            .adapter
            .unwrap_or_else(|| self.inner.config.default_adapter.clone());
        if !self.adapters().contains(&adapter) {
            tracing::warn!(namespace = %namespace, adapter = %adapter, "Unknown persistence adapter");
            return Err(StoreError::UnknownAdapter(adapter));
        }

        let config = PersistenceConfig {
            adapter,
            storage_key: options
                .key
                .unwrap_or_else(|| self.default_storage_key(namespace)),
            include: options.include,
            exclude: options.exclude,
            max_age_days: options.max_age_days,
            path: options.path,
        };
        self.lock()
            .persistence
            .insert(namespace.to_string(), config.clone());
        Ok(config)
    }

    /// Drop a namespace's persistence config, optionally deleting the stored blob
    pub fn remove_persistence(&self, namespace: &str, clear_stored: bool) -> StoreResult<bool> {
        let Some(config) = self.lock().persistence.remove(namespace) else {
            return Ok(false);
        };
        if clear_stored {
            if let Some(adapter) = self.adapters().get(&config.adapter) {
                adapter.remove(&config.storage_key)?;
            }
        }
        Ok(true)
    }

    pub fn persistence_config(&self, namespace: &str) -> Option<PersistenceConfig> {
        self.lock().persistence.get(namespace).cloned()
    }

    /// Reload a configured namespace from its adapter without notifying.
    ///
    /// Stored keys are merged over the current namespace. Returns whether
    /// anything was stored.
    pub fn restore_namespace(&self, namespace: &str) -> StoreResult<bool> {
        let config = self
            .persistence_config(namespace)
            .ok_or_else(|| StoreError::NotPersisted(namespace.to_string()))?;
        let adapter = self
            .adapters()
            .get(&config.adapter)
            .ok_or_else(|| StoreError::UnknownAdapter(config.adapter.clone()))?;

        match adapter.get(&config.storage_key)? {
            Some(Value::Object(stored)) => {
                let mut state = self.lock();
                state
                    .namespaces
                    .entry(namespace.to_string())
                    .or_default()
                    .extend(stored);
                Ok(true)
            }
            Some(_) => {
                tracing::warn!(namespace = %namespace, "Persisted state is not an object, ignoring");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn default_storage_key(&self, namespace: &str) -> String {
        format!("{}{}", self.inner.config.storage_prefix, namespace)
    }

    /// Best-effort write of a namespace to its adapter. Errors are logged only.
    fn write_through(&self, namespace: &str, force: bool) {
        let Some(plan) = self.persist_plan(namespace, force) else {
            return;
        };
        match plan
            .adapter
            .set(&plan.storage_key, &plan.payload, &plan.options)
        {
            Ok(()) => tracing::trace!(namespace = %namespace, storage_key = %plan.storage_key, "Persisted"),
            Err(e) => tracing::warn!(
                namespace = %namespace,
                adapter = %plan.adapter.name(),
                error = %e,
                "Failed to persist namespace"
            ),
        }
    }

    fn persist_plan(&self, namespace: &str, force: bool) -> Option<PersistPlan> {
        let state = self.lock();
        let config = match state.persistence.get(namespace) {
            Some(config) => config.clone(),
            None if force => PersistenceConfig {
                adapter: self.inner.config.default_adapter.clone(),
                storage_key: self.default_storage_key(namespace),
                include: None,
                exclude: Vec::new(),
                max_age_days: None,
                path: None,
            },
            None => return None,
        };
        let payload = Value::Object(
            state
                .namespaces
                .get(namespace)
                .map(|ns| config.filter(ns))
                .unwrap_or_default(),
        );
        drop(state);

        let Some(adapter) = self.adapters().get(&config.adapter) else {
            tracing::warn!(namespace = %namespace, adapter = %config.adapter, "Unknown persistence adapter");
            return None;
        };
        Some(PersistPlan {
            adapter,
            options: config.write_options(),
            storage_key: config.storage_key,
            payload,
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn adapters(&self) -> MutexGuard<'_, AdapterRegistry> {
        self.inner
            .adapters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, namespace: &str, kind: ChangeKind, changes: &Map<String, Value>) {
        if !self.is_debug() {
            return;
        }
        tracing::debug!(
            namespace = %namespace,
            ?kind,
            keys = ?changes.keys().collect::<Vec<_>>(),
            "State changed"
        );
        self.history().record(namespace, kind, changes.clone());
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("namespaces", &self.get_namespaces())
            .field("debug", &self.is_debug())
            .finish()
    }
}
