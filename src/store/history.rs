//! Diagnostic change history
//!
//! Bounded per-namespace ring buffer, only filled while debug is enabled.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};

use super::subscription::ChangeKind;

/// Default number of entries kept per namespace
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// One recorded change
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub namespace: String,
    pub kind: ChangeKind,
    pub changes: Map<String, Value>,
}

#[derive(Debug)]
pub(crate) struct History {
    limit: usize,
    entries: HashMap<String, VecDeque<HistoryEntry>>,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn record(&mut self, namespace: &str, kind: ChangeKind, changes: Map<String, Value>) {
        let log = self.entries.entry(namespace.to_string()).or_default();
        if log.len() == self.limit {
            log.pop_front();
        }
        log.push_back(HistoryEntry {
            timestamp: Utc::now(),
            namespace: namespace.to_string(),
            kind,
            changes,
        });
    }

    /// Oldest-first; with a limit, only the most recent `limit` entries
    pub fn recent(&self, namespace: &str, limit: Option<usize>) -> Vec<HistoryEntry> {
        let Some(log) = self.entries.get(namespace) else {
            return Vec::new();
        };
        let skip = limit.map_or(0, |n| log.len().saturating_sub(n));
        log.iter().skip(skip).cloned().collect()
    }
}
