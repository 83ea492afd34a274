//! Health check endpoint.
//!
//! Returns 200 OK when the active storage backend is usable: always for the
//! in-memory backend, and when PostgreSQL answers for the durable one.
//! Otherwise 503 Service Unavailable.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::storage::StorageBackend;
use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: StorageBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    postgres: Option<bool>,
    identity_provider: bool,
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let postgres = state.postgres_healthy().await;
    let healthy = postgres.unwrap_or(true);

    let backend = if state.storage().has_durable() {
        StorageBackend::Postgres
    } else {
        StorageBackend::Memory
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
            backend,
            postgres,
            identity_provider: state.identity().is_some(),
        }),
    )
}

/// Create the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
