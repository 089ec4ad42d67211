//! Data Transfer Objects
//!
//! Response types for the inspector endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::persistence::PersistenceConfig;
use crate::store::{DerivedInfo, HistoryEntry, StoreStats};

// ============================================
// NAMESPACE DTOs
// ============================================

/// Namespace list response
#[derive(Debug, Serialize, Deserialize)]
pub struct NamespaceListResponse {
    pub namespaces: Vec<String>,
    pub total: usize,
}

/// Everything the store knows about one namespace
#[derive(Debug, Serialize)]
pub struct NamespaceDetailResponse {
    pub namespace: String,
    pub keys: Vec<String>,
    pub subscriptions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence: Option<PersistenceConfig>,
    pub derived: Vec<DerivedInfo>,
}

/// Value at a path inside a namespace
#[derive(Debug, Serialize, Deserialize)]
pub struct ValueResponse {
    pub namespace: String,
    pub path: String,
    pub value: Value,
}

// ============================================
// HISTORY DTOs
// ============================================

/// History query parameters
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// History response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub namespace: String,
    pub debug: bool,
    pub total: usize,
    pub entries: Vec<HistoryEntry>,
}

// ============================================
// STATUS DTOs
// ============================================

/// Store counters
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: StoreStats,
    pub adapters: Vec<String>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub namespaces: usize,
    pub debug: bool,
    pub uptime_seconds: u64,
    pub version: String,
}
