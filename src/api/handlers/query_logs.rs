//! Query-log handlers: list, heavy view, get, stats, retention purge.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    PaginationMeta, PaginationParams, PurgeParams, PurgeResponse, QueryLogListResponse,
    QueryLogQuery,
};
use crate::app_state::AppState;
use crate::domain::{QueryLogRecord, QueryLogStats};
use crate::error::{AuditError, ErrorResponse};
use crate::persistence::QueryLogFilter;

/// `GET /query-logs` — List query logs, newest first.
///
/// # Errors
///
/// Returns [`AuditError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/query-logs",
    tag = "Query logs",
    summary = "List query logs",
    params(QueryLogQuery),
    responses(
        (status = 200, description = "Paginated query-log list", body = QueryLogListResponse),
    )
)]
pub async fn list_query_logs(
    State(state): State<AppState>,
    Query(query): Query<QueryLogQuery>,
) -> Result<impl IntoResponse, AuditError> {
    let page = query.pagination().page_request();
    let result = state
        .log_service
        .list_query_logs(query.filter(), page)
        .await?;

    Ok(Json(QueryLogListResponse {
        pagination: PaginationMeta::new(page, result.total),
        data: result.items,
    }))
}

/// `GET /query-logs/heavy` — List heavy queries only.
///
/// # Errors
///
/// Returns [`AuditError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/query-logs/heavy",
    tag = "Query logs",
    summary = "List heavy queries",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated heavy-query list", body = QueryLogListResponse),
    )
)]
pub async fn list_heavy_queries(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, AuditError> {
    let page = params.page_request();
    let result = state
        .log_service
        .list_query_logs(QueryLogFilter { heavy_only: true }, page)
        .await?;

    Ok(Json(QueryLogListResponse {
        pagination: PaginationMeta::new(page, result.total),
        data: result.items,
    }))
}

/// `GET /query-logs/{id}` — Get one query log.
///
/// # Errors
///
/// Returns [`AuditError::QueryLogNotFound`] if the row does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/query-logs/{id}",
    tag = "Query logs",
    summary = "Get query log",
    params(("id" = i64, Path, description = "Query-log row id")),
    responses(
        (status = 200, description = "Query-log row", body = QueryLogRecord),
        (status = 404, description = "Query log not found", body = ErrorResponse),
    )
)]
pub async fn get_query_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AuditError> {
    let record = state.log_service.get_query_log(id).await?;
    Ok(Json(record))
}

/// `GET /query-logs/stats` — Aggregate statistics.
///
/// # Errors
///
/// Returns [`AuditError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/query-logs/stats",
    tag = "Query logs",
    summary = "Query-log statistics",
    description = "Total, heavy and failed counts plus average and maximum duration over all logged queries.",
    responses(
        (status = 200, description = "Aggregate statistics", body = QueryLogStats),
    )
)]
pub async fn query_log_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AuditError> {
    let stats = state.log_service.query_log_stats().await?;
    Ok(Json(stats))
}

/// `DELETE /query-logs?older_than_days=N` — Retention purge.
///
/// # Errors
///
/// Returns [`AuditError::InvalidRequest`] for a zero age.
#[utoipa::path(
    delete,
    path = "/api/v1/query-logs",
    tag = "Query logs",
    summary = "Purge old query logs",
    params(PurgeParams),
    responses(
        (status = 200, description = "Rows deleted", body = PurgeResponse),
        (status = 400, description = "Invalid age", body = ErrorResponse),
    )
)]
pub async fn purge_query_logs(
    State(state): State<AppState>,
    Query(params): Query<PurgeParams>,
) -> Result<impl IntoResponse, AuditError> {
    let deleted = state
        .log_service
        .purge_query_logs(params.older_than_days)
        .await?;
    Ok(Json(PurgeResponse { deleted }))
}

/// Query-log routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/query-logs", get(list_query_logs).delete(purge_query_logs))
        .route("/query-logs/heavy", get(list_heavy_queries))
        .route("/query-logs/stats", get(query_log_stats))
        .route("/query-logs/{id}", get(get_query_log))
}
