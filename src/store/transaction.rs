//! Transaction buffering
//!
//! While a transaction is active, writes still mutate the namespaces but
//! their diffs are merged here instead of being delivered. Commit flushes
//! one notification per touched namespace.
//!
//! A reset or import inside a transaction marks the namespace structural.
//! Its commit notification then reaches every subscriber of the namespace
//! and carries the whole namespace as the change set.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::engine::StateStore;
use super::subscription::ChangeKind;

/// Accumulated diff for one namespace
#[derive(Debug, Default, Clone)]
pub(crate) struct PendingChanges {
    pub changes: Map<String, Value>,
    /// Some write in the transaction asked for persistence
    pub persist: bool,
    /// Latest wholesale replacement, if any
    pub structural: Option<ChangeKind>,
}

impl PendingChanges {
    /// Kind of the notification sent at commit
    pub fn kind(&self) -> ChangeKind {
        self.structural.unwrap_or(ChangeKind::Update)
    }
}

/// Idle/Active flag plus the pending buffer
#[derive(Debug, Default)]
pub(crate) struct TransactionState {
    pub active: bool,
    pub pending: BTreeMap<String, PendingChanges>,
}

impl TransactionState {
    /// Enter the Active state. Returns false if already active.
    pub fn begin(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.pending.clear();
        true
    }

    /// Merge a diff into the buffer; later writes to a key win
    pub fn buffer(&mut self, namespace: &str, changes: Map<String, Value>, persist: bool) {
        let entry = self.pending.entry(namespace.to_string()).or_default();
        entry.changes.extend(changes);
        entry.persist |= persist;
    }

    /// Mark a namespace as replaced wholesale
    pub fn buffer_structural(&mut self, namespace: &str, kind: ChangeKind) {
        let entry = self.pending.entry(namespace.to_string()).or_default();
        entry.changes.clear();
        entry.structural = Some(kind);
    }

    /// Leave the Active state and hand back everything buffered.
    /// Returns `None` if no transaction was active.
    pub fn finish(&mut self) -> Option<BTreeMap<String, PendingChanges>> {
        if !self.active {
            return None;
        }
        self.active = false;
        Some(std::mem::take(&mut self.pending))
    }
}

/// Committer returned by [`StateStore::start_transaction`].
///
/// Nested starts hand out a committer for the same transaction, so any of
/// them commits the whole batch.
#[must_use = "a transaction does nothing until it is committed"]
pub struct Transaction {
    store: StateStore,
}

impl Transaction {
    pub(crate) fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Flush all buffered changes
    pub fn commit(self) {
        self.store.commit_transaction();
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diff(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_begin_twice() {
        let mut tx = TransactionState::default();
        assert!(tx.begin());
        assert!(!tx.begin());
        assert!(tx.active);
    }

    #[test]
    fn test_buffer_merges() {
        let mut tx = TransactionState::default();
        tx.begin();
        tx.buffer("ns", diff(&[("a", json!(1))]), false);
        tx.buffer("ns", diff(&[("b", json!(2)), ("a", json!(3))]), true);
        tx.buffer("other", diff(&[("c", json!(4))]), false);

        let pending = tx.finish().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(
            Value::Object(pending["ns"].changes.clone()),
            json!({"a": 3, "b": 2})
        );
        assert!(pending["ns"].persist);
        assert!(!pending["other"].persist);
        assert!(!tx.active);
    }

    #[test]
    fn test_structural_marker() {
        let mut tx = TransactionState::default();
        tx.begin();
        tx.buffer("ns", diff(&[("a", json!(1))]), false);
        tx.buffer_structural("ns", ChangeKind::Reset);
        tx.buffer("ns", diff(&[("b", json!(2))]), false);
        tx.buffer("plain", diff(&[("c", json!(3))]), false);

        let pending = tx.finish().unwrap();
        assert_eq!(pending["ns"].kind(), ChangeKind::Reset);
        assert_eq!(pending["plain"].kind(), ChangeKind::Update);
    }

    #[test]
    fn test_finish_when_idle() {
        let mut tx = TransactionState::default();
        assert!(tx.finish().is_none());
    }
}
