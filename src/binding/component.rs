//! Component binding
//!
//! A [`ComponentBinding`] scopes a store to one namespace on behalf of a
//! consumer. Subscriptions made through it are removed when the binding is
//! torn down or dropped.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::inputs::InputHandler;
use super::lifecycle::Lifecycle;
use crate::persistence::{PersistenceOptions, StorageType};
use crate::store::{
    SetOptions, StateChange, StateStore, StoreResult, SubscriptionId, WeakStateStore,
};

/// Namespace that shared keys are mirrored through
pub const GLOBAL_NAMESPACE: &str = "global";

/// Options for [`connect`]
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Namespace to bind; defaults to the component id
    pub namespace: Option<String>,
    /// Seeded silently on connect
    pub initial_state: Option<Value>,
    /// Keys mirrored in both directions with the `global` namespace
    pub shared_keys: Vec<String>,
    /// Configure persistence for the namespace
    pub persist: bool,
    /// Adapter used when `persist` is set (defaults to local)
    pub persistence_type: Option<StorageType>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn initial_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn shared_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn persist(mut self, storage: StorageType) -> Self {
        self.persist = true;
        self.persistence_type = Some(storage);
        self
    }
}

/// Bind a component to a namespace of `store`
pub fn connect(
    store: &StateStore,
    component_id: &str,
    options: ConnectOptions,
) -> StoreResult<ComponentBinding> {
    let namespace = options
        .namespace
        .clone()
        .unwrap_or_else(|| component_id.to_string());

    let mut binding = ComponentBinding {
        store: store.clone(),
        component_id: component_id.to_string(),
        namespace,
        lifecycle: Lifecycle::new(),
    };

    if let Some(initial) = options.initial_state {
        store.set(&binding.namespace, initial, SetOptions::silent())?;
    }

    if options.persist {
        let storage = options.persistence_type.unwrap_or(StorageType::Local);
        store.configure_persistence(&binding.namespace, PersistenceOptions::new(storage))?;
    }

    if !options.shared_keys.is_empty() {
        binding.share_keys(&options.shared_keys)?;
    }

    tracing::debug!(
        component_id = %binding.component_id,
        namespace = %binding.namespace,
        "Component connected"
    );
    Ok(binding)
}

/// Per-component facade over one namespace
pub struct ComponentBinding {
    store: StateStore,
    component_id: String,
    namespace: String,
    lifecycle: Lifecycle,
}

impl ComponentBinding {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(&self.namespace, key)
    }

    pub fn get_all(&self) -> Value {
        self.store.get_all(&self.namespace)
    }

    pub fn has(&self, key: &str) -> bool {
        self.store.has(&self.namespace, key)
    }

    /// Set a single key
    pub fn set(&self, key: &str, value: impl Into<Value>) -> StoreResult<Value> {
        let mut update = Map::new();
        update.insert(key.to_string(), value.into());
        self.set_many(Value::Object(update))
    }

    /// Set several keys at once
    pub fn set_many(&self, updates: Value) -> StoreResult<Value> {
        self.store
            .set(&self.namespace, updates, SetOptions::default())
    }

    pub fn set_with(&self, updates: Value, options: SetOptions) -> StoreResult<Value> {
        self.store.set(&self.namespace, updates, options)
    }

    /// Subscribe to the bound namespace; removed at teardown
    pub fn subscribe<F>(&mut self, keys: Option<Vec<String>>, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        let id = self
            .store
            .subscribe_with(&self.namespace, keys, Arc::new(callback));
        self.unsubscribe_on_teardown(id);
        id
    }

    /// Run `f` inside a transaction and commit afterwards
    pub fn transaction<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let tx = self.store.start_transaction();
        let result = f(self);
        tx.commit();
        result
    }

    /// Replace the namespace with `initial` (or empty), notifying every subscriber
    pub fn reset(&self, initial: Option<Value>) -> StoreResult<()> {
        self.store.reset_state(&self.namespace, initial, false)
    }

    /// Empty the namespace
    pub fn clear(&self) -> StoreResult<()> {
        self.reset(None)
    }

    /// Flip the truthiness of a key and store the result as a boolean
    pub fn toggle(&self, key: &str) -> StoreResult<bool> {
        let next = !self.get(key).as_ref().is_some_and(is_truthy);
        self.set(key, next)?;
        Ok(next)
    }

    /// Register a derived value in the bound namespace; removed at teardown
    pub fn derived<F, I, S>(&mut self, key: &str, dependencies: I, compute: F) -> StoreResult<SubscriptionId>
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = self
            .store
            .create_derived_state(&self.namespace, key, dependencies, compute)?;
        self.unsubscribe_on_teardown(id);
        Ok(id)
    }

    /// Handlers keyed by field name, each writing to its mapped state key
    pub fn bind_inputs<I, F, K>(&self, fields: I) -> BTreeMap<String, InputHandler>
    where
        I: IntoIterator<Item = (F, K)>,
        F: Into<String>,
        K: AsRef<str>,
    {
        fields
            .into_iter()
            .map(|(field, key)| {
                let handler = InputHandler::new(self.store.clone(), &self.namespace, key.as_ref());
                (field.into(), handler)
            })
            .collect()
    }

    /// Register an arbitrary cleanup task
    pub fn on_teardown<F>(&mut self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.lifecycle.add(task);
    }

    /// Run all cleanup tasks. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.lifecycle.is_torn_down() {
            return;
        }
        let ran = self.lifecycle.run();
        tracing::debug!(
            component_id = %self.component_id,
            namespace = %self.namespace,
            tasks = ran,
            "Component torn down"
        );
    }

    pub fn is_torn_down(&self) -> bool {
        self.lifecycle.is_torn_down()
    }

    fn unsubscribe_on_teardown(&mut self, id: SubscriptionId) {
        let weak = self.store.downgrade();
        self.lifecycle.add(move || {
            if let Some(store) = weak.upgrade() {
                store.unsubscribe(id);
            }
        });
    }

    /// Mirror `keys` between this namespace and `global`.
    ///
    /// Each direction forwards through a normal `set`; once both sides hold
    /// the same value the forwarded write is a no-op and the loop stops.
    fn share_keys(&mut self, keys: &[String]) -> StoreResult<()> {
        if self.namespace == GLOBAL_NAMESPACE {
            tracing::warn!(component_id = %self.component_id, "Shared keys on the global namespace are ignored");
            return Ok(());
        }

        let mut seed = Map::new();
        for key in keys {
            if let Some(value) = self.get(key) {
                seed.insert(key.clone(), value);
            }
        }
        if !seed.is_empty() {
            self.store
                .set(GLOBAL_NAMESPACE, Value::Object(seed), SetOptions::default())?;
        }

        let outbound = mirror(self.store.downgrade(), &self.namespace, GLOBAL_NAMESPACE, keys);
        let id = self
            .store
            .subscribe_with(&self.namespace, Some(keys.to_vec()), outbound);
        self.unsubscribe_on_teardown(id);

        let inbound = mirror(self.store.downgrade(), GLOBAL_NAMESPACE, &self.namespace, keys);
        let id = self
            .store
            .subscribe_with(GLOBAL_NAMESPACE, Some(keys.to_vec()), inbound);
        self.unsubscribe_on_teardown(id);

        Ok(())
    }
}

impl Drop for ComponentBinding {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for ComponentBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentBinding")
            .field("component_id", &self.component_id)
            .field("namespace", &self.namespace)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

/// Callback copying `keys` from `from` into `to`
fn mirror(
    store: WeakStateStore,
    from: &str,
    to: &str,
    keys: &[String],
) -> crate::store::Callback {
    let from = from.to_string();
    let to = to.to_string();
    let keys = keys.to_vec();

    Arc::new(move |_change: &StateChange| {
        let Some(store) = store.upgrade() else {
            return;
        };
        let mut forward = Map::new();
        for key in &keys {
            if let Some(value) = store.get(&from, key) {
                forward.insert(key.clone(), value);
            }
        }
        if forward.is_empty() {
            return;
        }
        if let Err(e) = store.set(&to, Value::Object(forward), SetOptions::default()) {
            tracing::warn!(from = %from, to = %to, error = %e, "Failed to mirror shared keys");
        }
    })
}

/// Loose truthiness used by `toggle`
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::InputEvent;
    use crate::persistence::AdapterRegistry;
    use crate::store::StoreConfig;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&StateChange) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &StateChange| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_namespace_defaults_to_component_id() {
        let store = StateStore::in_memory();
        let binding = connect(&store, "sidebar", ConnectOptions::new()).unwrap();
        assert_eq!(binding.namespace(), "sidebar");

        let named = connect(&store, "sidebar", ConnectOptions::new().namespace("nav")).unwrap();
        assert_eq!(named.namespace(), "nav");
    }

    #[test]
    fn test_initial_state_is_silent() {
        let store = StateStore::in_memory();
        let (count, cb) = counter();
        store.subscribe("panel", cb);

        let binding = connect(
            &store,
            "panel",
            ConnectOptions::new().initial_state(json!({"open": false})),
        )
        .unwrap();
        assert_eq!(binding.get("open"), Some(json!(false)));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_shared_key_mirroring_terminates() {
        let store = StateStore::in_memory();
        let a = connect(&store, "a", ConnectOptions::new().shared_keys(["theme"])).unwrap();
        let b = connect(&store, "b", ConnectOptions::new().shared_keys(["theme"])).unwrap();

        let (global_count, cb) = counter();
        store.subscribe(GLOBAL_NAMESPACE, cb);

        a.set("theme", "dark").unwrap();
        assert_eq!(b.get("theme"), Some(json!("dark")));
        assert_eq!(store.get(GLOBAL_NAMESPACE, "theme"), Some(json!("dark")));
        // a -> global once; the echo from b is a no-op
        assert_eq!(global_count.load(Ordering::SeqCst), 1);

        b.set("theme", "light").unwrap();
        assert_eq!(a.get("theme"), Some(json!("light")));
    }

    #[test]
    fn test_shared_keys_seed_global() {
        let store = StateStore::in_memory();
        let _binding = connect(
            &store,
            "prefs",
            ConnectOptions::new()
                .initial_state(json!({"lang": "en"}))
                .shared_keys(["lang", "missing"]),
        )
        .unwrap();
        assert_eq!(store.get_all(GLOBAL_NAMESPACE), json!({"lang": "en"}));
    }

    #[test]
    fn test_teardown_removes_subscriptions() {
        let store = StateStore::in_memory();
        let (count, cb) = counter();
        {
            let mut binding =
                connect(&store, "a", ConnectOptions::new().shared_keys(["theme"])).unwrap();
            binding.subscribe(None, cb);
            assert_eq!(store.subscription_count("a"), 2);
            assert_eq!(store.subscription_count(GLOBAL_NAMESPACE), 1);
        }

        assert_eq!(store.subscription_count("a"), 0);
        assert_eq!(store.subscription_count(GLOBAL_NAMESPACE), 0);
        store.set("a", json!({"x": 1}), SetOptions::default()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_teardown_is_idempotent() {
        let store = StateStore::in_memory();
        let mut binding = connect(&store, "a", ConnectOptions::new()).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        binding.on_teardown(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });

        binding.teardown();
        binding.teardown();
        drop(binding);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_persist_configures_local_adapter() {
        let store = StateStore::new(StoreConfig::default(), AdapterRegistry::in_memory());
        let binding = connect(
            &store,
            "settings",
            ConnectOptions {
                persist: true,
                ..Default::default()
            },
        )
        .unwrap();
        let config = store.persistence_config(binding.namespace()).unwrap();
        assert_eq!(config.adapter, "local");
        assert_eq!(config.storage_key, "statehub_settings");

        let session = connect(&store, "tabs", ConnectOptions::new().persist(StorageType::Session))
            .unwrap();
        assert_eq!(
            store.persistence_config(session.namespace()).unwrap().adapter,
            "session"
        );
    }

    #[test]
    fn test_toggle_and_clear() {
        let store = StateStore::in_memory();
        let binding = connect(&store, "menu", ConnectOptions::new()).unwrap();

        assert!(binding.toggle("open").unwrap());
        assert!(!binding.toggle("open").unwrap());
        binding.set("count", 0).unwrap();
        assert!(binding.toggle("count").unwrap());
        assert_eq!(binding.get("count"), Some(json!(true)));

        binding.clear().unwrap();
        assert_eq!(binding.get_all(), json!({}));
        assert!(!binding.has("open"));
    }

    #[test]
    fn test_transaction_notifies_once() {
        let store = StateStore::in_memory();
        let mut binding = connect(&store, "form", ConnectOptions::new()).unwrap();
        let (count, cb) = counter();
        binding.subscribe(None, cb);

        let written = binding.transaction(|b| {
            b.set("a", 1).unwrap();
            b.set("b", 2).unwrap();
            2
        });
        assert_eq!(written, 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bind_inputs() {
        let store = StateStore::in_memory();
        let binding = connect(&store, "form", ConnectOptions::new()).unwrap();
        let handlers = binding.bind_inputs([("agree", "terms"), ("age", "user.age")]);

        handlers["agree"].handle(&InputEvent::checkbox(true)).unwrap();
        handlers["age"].handle(&InputEvent::number("not a number")).unwrap();

        assert_eq!(binding.get("terms"), Some(json!(true)));
        assert_eq!(binding.get("user.age"), Some(json!(0.0)));
    }

    #[test]
    fn test_derived_removed_at_teardown() {
        let store = StateStore::in_memory();
        let mut binding = connect(
            &store,
            "cart",
            ConnectOptions::new().initial_state(json!({"qty": 1})),
        )
        .unwrap();
        binding
            .derived("double", ["qty"], |s: &Value| {
                Ok(json!(s["qty"].as_i64().unwrap_or(0) * 2))
            })
            .unwrap();
        binding.set("qty", 3).unwrap();
        assert_eq!(binding.get("double"), Some(json!(6)));

        binding.teardown();
        store.set("cart", json!({"qty": 10}), SetOptions::default()).unwrap();
        assert_eq!(store.get("cart", "double"), Some(json!(6)));
        assert_eq!(store.stats().derived_values, 0);
        assert!(store.derived_values("cart").is_empty());
    }

    #[test]
    fn test_repeated_connect_does_not_accumulate_derived() {
        let store = StateStore::in_memory();
        for _ in 0..5 {
            let mut binding = connect(&store, "cart", ConnectOptions::new()).unwrap();
            binding
                .derived("double", ["qty"], |s: &Value| {
                    Ok(json!(s["qty"].as_i64().unwrap_or(0) * 2))
                })
                .unwrap();
            binding.teardown();
        }
        let stats = store.stats();
        assert_eq!(stats.derived_values, 0);
        assert_eq!(stats.subscriptions, 0);
    }

    #[test]
    fn test_clear_inside_transaction_notifies_once_at_commit() {
        let store = StateStore::in_memory();
        let mut binding = connect(
            &store,
            "form",
            ConnectOptions::new().initial_state(json!({"name": "x", "age": 3})),
        )
        .unwrap();

        let (calls, cb) = counter();
        binding.subscribe(None, cb);

        binding.transaction(|b| {
            b.clear().unwrap();
            b.set("name", "y").unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(binding.get_all(), json!({"name": "y"}));
    }
}
