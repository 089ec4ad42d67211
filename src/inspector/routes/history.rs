//! History Routes
//!
//! - GET /api/v1/history/:namespace?limit=N - Recorded changes, oldest first
//!
//! History is only recorded while the store runs in debug mode; otherwise
//! the entry list is empty.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::inspector::dto::{HistoryQuery, HistoryResponse};
use crate::inspector::error::{InspectorError, InspectorResult};
use crate::inspector::state::InspectorState;

/// GET /api/v1/history/:namespace
pub async fn get_history(
    State(state): State<Arc<InspectorState>>,
    Path(namespace): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> InspectorResult<Json<HistoryResponse>> {
    if let Some(limit) = query.limit {
        if limit == 0 || limit > state.config.max_history {
            return Err(InspectorError::Validation(format!(
                "limit must be between 1 and {}",
                state.config.max_history
            )));
        }
    }

    let entries = state.store.get_history(&namespace, query.limit);
    Ok(Json(HistoryResponse {
        namespace,
        debug: state.store.is_debug(),
        total: entries.len(),
        entries,
    }))
}
