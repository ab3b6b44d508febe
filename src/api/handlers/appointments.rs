//! Appointment handlers: audited book, get, update, delete.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{AppointmentResponse, BookAppointmentRequest, UpdateAppointmentRequest};
use crate::app_state::AppState;
use crate::domain::RequestContext;
use crate::error::{AuditError, ErrorResponse};

/// `POST /appointments` — Book an appointment.
///
/// # Errors
///
/// Returns [`AuditError`] on invalid input or a failed save.
#[utoipa::path(
    post,
    path = "/api/v1/appointments",
    tag = "Appointments",
    summary = "Book an appointment",
    description = "Inserts an appointment and records an `Added` change log attributed to the `x-user-id` caller.",
    request_body = BookAppointmentRequest,
    responses(
        (status = 201, description = "Appointment booked", body = AppointmentResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Save or audit write failed", body = ErrorResponse),
    )
)]
pub async fn book_appointment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<BookAppointmentRequest>,
) -> Result<impl IntoResponse, AuditError> {
    let appointment = state
        .appointment_service
        .book(req.into_appointment(), &ctx)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(AppointmentResponse::from(appointment)),
    ))
}

/// `GET /appointments/{id}` — Get an appointment.
///
/// # Errors
///
/// Returns [`AuditError::AppointmentNotFound`] if the row does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/appointments/{id}",
    tag = "Appointments",
    summary = "Get appointment",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment", body = AppointmentResponse),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
    )
)]
pub async fn get_appointment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AuditError> {
    let appointment = state.appointment_service.get(id, &ctx).await?;
    Ok(Json(AppointmentResponse::from(appointment)))
}

/// `PATCH /appointments/{id}` — Update an appointment.
///
/// # Errors
///
/// Returns [`AuditError`] if the row is missing, the input is invalid, or
/// the save fails.
#[utoipa::path(
    patch,
    path = "/api/v1/appointments/{id}",
    tag = "Appointments",
    summary = "Update appointment",
    description = "Applies the given fields and records a `Modified` change log listing the fields that changed.",
    params(("id" = i64, Path, description = "Appointment id")),
    request_body = UpdateAppointmentRequest,
    responses(
        (status = 200, description = "Updated appointment", body = AppointmentResponse),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
    )
)]
pub async fn update_appointment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<impl IntoResponse, AuditError> {
    let appointment = state
        .appointment_service
        .update(id, req.into(), &ctx)
        .await?;
    Ok(Json(AppointmentResponse::from(appointment)))
}

/// `DELETE /appointments/{id}` — Delete an appointment.
///
/// # Errors
///
/// Returns [`AuditError`] if the row is missing or the save fails.
#[utoipa::path(
    delete,
    path = "/api/v1/appointments/{id}",
    tag = "Appointments",
    summary = "Delete appointment",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 204, description = "Appointment deleted"),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
    )
)]
pub async fn delete_appointment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AuditError> {
    state.appointment_service.delete(id, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Appointment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(book_appointment))
        .route(
            "/appointments/{id}",
            get(get_appointment)
                .patch(update_appointment)
                .delete(delete_appointment),
        )
}
