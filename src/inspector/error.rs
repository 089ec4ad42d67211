//! Inspector Error Types
//!
//! Error types for the inspector layer and their conversion to HTTP
//! responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Inspector error types
#[derive(Error, Debug)]
pub enum InspectorError {
    /// Unknown namespace or path
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad query parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store operation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl InspectorError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            InspectorError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            InspectorError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            InspectorError::Store(StoreError::InvalidInput { .. }) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT")
            }
            InspectorError::Store(StoreError::NotPersisted(_)) => {
                (StatusCode::NOT_FOUND, "NOT_PERSISTED")
            }
            InspectorError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            InspectorError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            InspectorError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for InspectorError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Inspector error occurred"
            );
        } else {
            tracing::debug!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Inspector request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for inspector handlers
pub type InspectorResult<T> = Result<T, InspectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let response = InspectorError::NotFound("ns".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = InspectorError::Store(StoreError::UnknownAdapter("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = InspectorError::Validation("limit".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
