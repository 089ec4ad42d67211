//! Subscription registry and notification delivery
//!
//! Subscriptions are grouped per namespace and kept in registration order,
//! which is also the delivery order. Delivery happens outside the store lock
//! and each callback is isolated: a panicking subscriber is logged and the
//! remaining subscribers still run.
//!
//! Every subscription carries a liveness flag shared with its delivery
//! targets. Removing the subscription clears the flag, so a callback that
//! was already collected for delivery is skipped once it is unsubscribed.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::path::{filter_matches, KeyPath};

/// Unique handle for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What kind of write produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Keyed update through `set` or a committed transaction
    Update,
    /// Namespace replaced by `reset_state`
    Reset,
    /// Namespace replaced by `import_state`
    Import,
}

impl ChangeKind {
    /// Structural changes reach every subscriber of the namespace
    pub fn is_structural(&self) -> bool {
        matches!(self, ChangeKind::Reset | ChangeKind::Import)
    }
}

/// Payload handed to subscriber callbacks
#[derive(Debug, Clone, Serialize)]
pub struct StateChange {
    pub namespace: String,
    pub kind: ChangeKind,
    /// Changed keys and their new values. For structural changes this is
    /// the complete new namespace.
    pub changes: Map<String, Value>,
    /// Copy of the namespace after the change
    pub state: Value,
}

impl StateChange {
    pub fn is_structural(&self) -> bool {
        self.kind.is_structural()
    }

    /// New value for `key` if it is part of this change
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.changes.get(key)
    }
}

/// Subscriber callback
pub type Callback = Arc<dyn Fn(&StateChange) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    keys: Option<Vec<KeyPath>>,
    callback: Callback,
    live: Arc<AtomicBool>,
}

/// A callback collected for delivery
#[derive(Clone)]
pub(crate) struct Target {
    pub id: SubscriptionId,
    pub callback: Callback,
    live: Arc<AtomicBool>,
}

impl Target {
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// All subscriptions of a store
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    next_id: u64,
    by_namespace: HashMap<String, Vec<Subscription>>,
}

impl SubscriptionRegistry {
    pub fn add(
        &mut self,
        namespace: &str,
        keys: Option<Vec<String>>,
        callback: Callback,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let keys = keys.map(|keys| keys.iter().map(|k| KeyPath::parse(k)).collect());

        self.by_namespace
            .entry(namespace.to_string())
            .or_default()
            .push(Subscription {
                id,
                keys,
                callback,
                live: Arc::new(AtomicBool::new(true)),
            });
        id
    }

    /// Remove a subscription from whichever namespace holds it
    pub fn remove(&mut self, id: SubscriptionId) -> Option<String> {
        let mut found = None;
        for (namespace, subs) in self.by_namespace.iter_mut() {
            if let Some(pos) = subs.iter().position(|s| s.id == id) {
                subs.remove(pos).live.store(false, Ordering::SeqCst);
                found = Some(namespace.clone());
                break;
            }
        }
        if let Some(namespace) = &found {
            if self.by_namespace.get(namespace).is_some_and(|s| s.is_empty()) {
                self.by_namespace.remove(namespace);
            }
        }
        found
    }

    /// Callbacks to run for a change, in registration order.
    ///
    /// `touched` is ignored for structural changes.
    pub fn matching(
        &self,
        namespace: &str,
        touched: &BTreeSet<KeyPath>,
        structural: bool,
    ) -> Vec<Target> {
        self.by_namespace
            .get(namespace)
            .map(|subs| {
                subs.iter()
                    .filter(|s| structural || filter_matches(s.keys.as_deref(), touched))
                    .map(|s| Target {
                        id: s.id,
                        callback: Arc::clone(&s.callback),
                        live: Arc::clone(&s.live),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self, namespace: &str) -> usize {
        self.by_namespace.get(namespace).map_or(0, |s| s.len())
    }

    pub fn total(&self) -> usize {
        self.by_namespace.values().map(|s| s.len()).sum()
    }
}

/// Run each still-registered callback with per-subscriber isolation
pub(crate) fn deliver(change: &StateChange, targets: &[Target]) {
    for target in targets {
        if !target.is_live() {
            tracing::trace!(subscription_id = %target.id, "Skipping removed subscriber");
            continue;
        }
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (target.callback)(change))) {
            tracing::error!(
                namespace = %change.namespace,
                subscription_id = %target.id,
                error = %panic_message(panic.as_ref()),
                "Subscriber failed during notification"
            );
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
