//! Change-log handlers: list, get, retention purge.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    ChangeLogListResponse, ChangeLogQuery, PaginationMeta, PurgeParams, PurgeResponse,
};
use crate::app_state::AppState;
use crate::domain::ChangeLogRecord;
use crate::error::{AuditError, ErrorResponse};

/// `GET /change-logs` — List change logs, newest first.
///
/// # Errors
///
/// Returns [`AuditError`] on an unknown change kind or storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/change-logs",
    tag = "Change logs",
    summary = "List change logs",
    description = "Returns a paginated list of change-log rows, newest first, optionally filtered by table and change kind.",
    params(ChangeLogQuery),
    responses(
        (status = 200, description = "Paginated change-log list", body = ChangeLogListResponse),
        (status = 400, description = "Unknown change kind", body = ErrorResponse),
    )
)]
pub async fn list_change_logs(
    State(state): State<AppState>,
    Query(query): Query<ChangeLogQuery>,
) -> Result<impl IntoResponse, AuditError> {
    let filter = query.filter()?;
    let page = query.pagination().page_request();
    let result = state.log_service.list_change_logs(&filter, page).await?;

    Ok(Json(ChangeLogListResponse {
        pagination: PaginationMeta::new(page, result.total),
        data: result.items,
    }))
}

/// `GET /change-logs/{id}` — Get one change log.
///
/// # Errors
///
/// Returns [`AuditError::ChangeLogNotFound`] if the row does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/change-logs/{id}",
    tag = "Change logs",
    summary = "Get change log",
    params(("id" = i64, Path, description = "Change-log row id")),
    responses(
        (status = 200, description = "Change-log row", body = ChangeLogRecord),
        (status = 404, description = "Change log not found", body = ErrorResponse),
    )
)]
pub async fn get_change_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AuditError> {
    let record = state.log_service.get_change_log(id).await?;
    Ok(Json(record))
}

/// `DELETE /change-logs?older_than_days=N` — Retention purge.
///
/// # Errors
///
/// Returns [`AuditError::InvalidRequest`] for a zero age.
#[utoipa::path(
    delete,
    path = "/api/v1/change-logs",
    tag = "Change logs",
    summary = "Purge old change logs",
    params(PurgeParams),
    responses(
        (status = 200, description = "Rows deleted", body = PurgeResponse),
        (status = 400, description = "Invalid age", body = ErrorResponse),
    )
)]
pub async fn purge_change_logs(
    State(state): State<AppState>,
    Query(params): Query<PurgeParams>,
) -> Result<impl IntoResponse, AuditError> {
    let deleted = state
        .log_service
        .purge_change_logs(params.older_than_days)
        .await?;
    Ok(Json(PurgeResponse { deleted }))
}

/// Change-log routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/change-logs",
            get(list_change_logs).delete(purge_change_logs),
        )
        .route("/change-logs/{id}", get(get_change_log))
}
