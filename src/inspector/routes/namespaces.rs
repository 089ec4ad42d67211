//! Namespace Routes
//!
//! Read-only views of store state.
//!
//! - GET /api/v1/namespaces - List namespaces
//! - GET /api/v1/namespaces/:namespace - Subscriptions, persistence and derived values
//! - GET /api/v1/snapshot - Entire state tree
//! - GET /api/v1/stats - Store counters
//! - GET /api/v1/state/:namespace - Namespace state
//! - GET /api/v1/state/:namespace/*path - Value at a path (`/` or `.` separated)

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::inspector::dto::{
    NamespaceDetailResponse, NamespaceListResponse, StatsResponse, ValueResponse,
};
use crate::inspector::error::{InspectorError, InspectorResult};
use crate::inspector::state::InspectorState;

/// GET /api/v1/namespaces
pub async fn list_namespaces(
    State(state): State<Arc<InspectorState>>,
) -> Json<NamespaceListResponse> {
    let namespaces = state.store.get_namespaces();
    Json(NamespaceListResponse {
        total: namespaces.len(),
        namespaces,
    })
}

/// GET /api/v1/namespaces/:namespace
pub async fn namespace_detail(
    State(state): State<Arc<InspectorState>>,
    Path(namespace): Path<String>,
) -> InspectorResult<Json<NamespaceDetailResponse>> {
    let store = &state.store;
    let exported = export_existing(store, &namespace)?;
    let keys = exported
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();

    Ok(Json(NamespaceDetailResponse {
        keys,
        subscriptions: store.subscription_count(&namespace),
        persistence: store.persistence_config(&namespace),
        derived: store.derived_values(&namespace),
        namespace,
    }))
}

/// GET /api/v1/snapshot
pub async fn snapshot(State(state): State<Arc<InspectorState>>) -> Json<Value> {
    Json(state.store.get_snapshot())
}

/// GET /api/v1/stats
pub async fn stats(State(state): State<Arc<InspectorState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: state.store.stats(),
        adapters: state.store.adapter_names(),
    })
}

/// GET /api/v1/state/:namespace
pub async fn get_namespace_state(
    State(state): State<Arc<InspectorState>>,
    Path(namespace): Path<String>,
) -> InspectorResult<Json<Value>> {
    export_existing(&state.store, &namespace).map(Json)
}

/// GET /api/v1/state/:namespace/*path
pub async fn get_value(
    State(state): State<Arc<InspectorState>>,
    Path((namespace, path)): Path<(String, String)>,
) -> InspectorResult<Json<ValueResponse>> {
    if !state.store.has_namespace(&namespace) {
        return Err(namespace_not_found(&namespace));
    }

    let path = path.trim_matches('/').replace('/', ".");
    let value = state
        .store
        .get(&namespace, &path)
        .ok_or_else(|| InspectorError::NotFound(format!("Path '{}' in namespace '{}'", path, namespace)))?;

    Ok(Json(ValueResponse {
        namespace,
        path,
        value,
    }))
}

/// Export a namespace without creating it as a side effect
fn export_existing(store: &crate::store::StateStore, namespace: &str) -> InspectorResult<Value> {
    if !store.has_namespace(namespace) {
        return Err(namespace_not_found(namespace));
    }
    Ok(store.export_state(namespace))
}

fn namespace_not_found(namespace: &str) -> InspectorError {
    InspectorError::NotFound(format!("Namespace '{}'", namespace))
}
