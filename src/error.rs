//! Audit-layer error types with HTTP status code mapping.
//!
//! [`AuditError`] is the central error type. Business-path failures
//! ([`AuditError::BusinessSave`], [`AuditError::AuditWrite`]) always reach
//! the caller; [`AuditError::QueryLogWrite`] is produced inside the
//! background writer and never leaves it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "change log not found: 42",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`AuditError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status               |
/// |-----------|-----------------|---------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request           |
/// | 2000–2999 | Not Found       | 404 Not Found             |
/// | 3000–3999 | Server          | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An entity could not be snapshotted or lacks a required key.
    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    /// Change-log row with the given ID was not found.
    #[error("change log not found: {0}")]
    ChangeLogNotFound(i64),

    /// Query-log row with the given ID was not found.
    #[error("query log not found: {0}")]
    QueryLogNotFound(i64),

    /// Appointment with the given ID was not found.
    #[error("appointment not found: {0}")]
    AppointmentNotFound(i64),

    /// The primary business write failed. Nothing was committed and no
    /// audit rows were written.
    #[error("business save failed: {0}")]
    BusinessSave(String),

    /// Business data was committed but writing its change-log rows failed.
    /// The audit trail for this save may be incomplete.
    #[error("audit write failed after committing {committed_rows} row(s): {reason}")]
    AuditWrite {
        /// Rows affected by the already-committed business save.
        committed_rows: u64,
        /// Underlying failure.
        reason: String,
    },

    /// Building or persisting a query-log row failed.
    #[error("query log write failed: {0}")]
    QueryLogWrite(String),

    /// Generic storage failure on a read or maintenance path.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuditError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidEntity(_) => 1002,
            Self::ChangeLogNotFound(_) => 2001,
            Self::QueryLogNotFound(_) => 2002,
            Self::AppointmentNotFound(_) => 2003,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::BusinessSave(_) => 3002,
            Self::AuditWrite { .. } => 3003,
            Self::QueryLogWrite(_) => 3004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidEntity(_) => StatusCode::BAD_REQUEST,
            Self::ChangeLogNotFound(_)
            | Self::QueryLogNotFound(_)
            | Self::AppointmentNotFound(_) => StatusCode::NOT_FOUND,
            Self::BusinessSave(_)
            | Self::AuditWrite { .. }
            | Self::QueryLogWrite(_)
            | Self::Persistence(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Details exposed alongside the message, if any.
    fn details(&self) -> Option<String> {
        match self {
            Self::AuditWrite { committed_rows, .. } => Some(format!(
                "business data committed ({committed_rows} row(s)); audit trail may be incomplete"
            )),
            _ => None,
        }
    }
}

impl IntoResponse for AuditError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = AuditError::ChangeLogNotFound(9);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), 2001);
    }

    #[test]
    fn audit_write_reports_committed_rows() {
        let err = AuditError::AuditWrite {
            committed_rows: 3,
            reason: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("3 row(s)"));
        assert!(err.details().is_some());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn into_response_sets_status() {
        let response = AuditError::InvalidRequest("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
