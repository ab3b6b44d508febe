//! System endpoints: health check and instrumentation counters.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::instrumentation::WriterStats;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /instrumentation/writer` — Background writer counters.
#[utoipa::path(
    get,
    path = "/api/v1/instrumentation/writer",
    tag = "System",
    summary = "Query-log writer statistics",
    description = "Enqueued, written, dropped, skipped and failed counts of the background query-log writer, plus the current queue depth.",
    responses(
        (status = 200, description = "Writer counters", body = WriterStats),
    )
)]
pub async fn writer_stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.log_service.writer_stats())
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

/// Instrumentation routes mounted under /api/v1.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/instrumentation/writer", get(writer_stats_handler))
}
