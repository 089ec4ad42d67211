//! State Inspector
//!
//! Read-only HTTP view of a running store, built with Axum.
//!
//! # Endpoints
//!
//! ## State
//! - `GET /api/v1/namespaces` - List namespaces
//! - `GET /api/v1/namespaces/:namespace` - Namespace details
//! - `GET /api/v1/snapshot` - Entire state tree
//! - `GET /api/v1/stats` - Store counters
//! - `GET /api/v1/state/:namespace` - Namespace state
//! - `GET /api/v1/state/:namespace/*path` - Value at a path
//!
//! ## History
//! - `GET /api/v1/history/:namespace?limit=N` - Recorded changes (debug mode)
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use statehub::inspector::{serve, InspectorConfig, InspectorState};
//! use statehub::store::StateStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = StateStore::in_memory();
//!     let config = InspectorConfig::default();
//!
//!     serve(InspectorState::new(store, config.clone()), &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{InspectorError, InspectorResult};
pub use state::{InspectorConfig, InspectorState};

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the inspector router with all routes and middleware
pub fn build_router(state: InspectorState) -> Router {
    let api_routes = Router::new()
        .route("/namespaces", get(routes::namespaces::list_namespaces))
        .route("/namespaces/:namespace", get(routes::namespaces::namespace_detail))
        .route("/snapshot", get(routes::namespaces::snapshot))
        .route("/stats", get(routes::namespaces::stats))
        .route("/state/:namespace", get(routes::namespaces::get_namespace_state))
        .route("/state/:namespace/*path", get(routes::namespaces::get_value))
        .route("/history/:namespace", get(routes::history::get_history));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/", get(routes::health::full_health));

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Start the inspector server
pub async fn serve(state: InspectorState, config: &InspectorConfig) -> Result<(), InspectorError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Statehub inspector listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| InspectorError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Statehub inspector shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::PersistenceOptions;
    use crate::store::{SetOptions, StateStore};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, StateStore) {
        let store = StateStore::in_memory();
        store
            .set("global", json!({"theme": "dark", "user": {"name": "ada"}}), SetOptions::default())
            .unwrap();
        let state = InspectorState::new(store.clone(), InspectorConfig::default());
        (build_router(state), store)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _store) = create_test_app();
        let (status, _) = get(app, "/health/live").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _store) = create_test_app();
        let (status, body) = get(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["namespaces"], 1);
        assert_eq!(body["debug"], false);
    }

    #[tokio::test]
    async fn test_list_namespaces() {
        let (app, store) = create_test_app();
        store.set("cart", json!({"qty": 1}), SetOptions::default()).unwrap();

        let (status, body) = get(app, "/api/v1/namespaces").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["namespaces"], json!(["cart", "global"]));
    }

    #[tokio::test]
    async fn test_snapshot() {
        let (app, _store) = create_test_app();
        let (status, body) = get(app, "/api/v1/snapshot").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["global"]["theme"], "dark");
    }

    #[tokio::test]
    async fn test_namespace_state() {
        let (app, _store) = create_test_app();
        let (status, body) = get(app, "/api/v1/state/global").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"theme": "dark", "user": {"name": "ada"}}));
    }

    #[tokio::test]
    async fn test_unknown_namespace_is_not_created() {
        let (app, store) = create_test_app();
        let (status, body) = get(app, "/api/v1/state/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert!(!store.has_namespace("missing"));
    }

    #[tokio::test]
    async fn test_value_at_path() {
        let (app, _store) = create_test_app();
        let (status, body) = get(app.clone(), "/api/v1/state/global/user/name").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["path"], "user.name");
        assert_eq!(body["value"], "ada");

        let (status, _) = get(app, "/api/v1/state/global/user.missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_namespace_detail() {
        let (app, store) = create_test_app();
        store
            .configure_persistence("global", PersistenceOptions::default())
            .unwrap();
        store.subscribe("global", |_| {});

        let (status, body) = get(app, "/api/v1/namespaces/global").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["keys"], json!(["theme", "user"]));
        assert_eq!(body["subscriptions"], 1);
        assert_eq!(body["persistence"]["storage_key"], "statehub_global");
    }

    #[tokio::test]
    async fn test_history() {
        let (app, store) = create_test_app();
        store.set_debug(true);
        store.set("global", json!({"theme": "light"}), SetOptions::default()).unwrap();
        store.set("global", json!({"theme": "blue"}), SetOptions::default()).unwrap();

        let (status, body) = get(app.clone(), "/api/v1/history/global?limit=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["entries"][0]["changes"]["theme"], "blue");

        let (status, _) = get(app, "/api/v1/history/global?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats() {
        let (app, _store) = create_test_app();
        let (status, body) = get(app, "/api/v1/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["namespaces"], 1);
        assert!(body["adapters"].as_array().unwrap().len() >= 4);
    }
}
