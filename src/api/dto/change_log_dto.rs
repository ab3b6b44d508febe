//! Change-log DTOs for list and detail endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::{PaginationMeta, PaginationParams, default_page, default_per_page};
use crate::domain::{ChangeKind, ChangeLogRecord};
use crate::error::AuditError;
use crate::persistence::ChangeLogFilter;

/// Query parameters for `GET /change-logs`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ChangeLogQuery {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Only rows for this table.
    #[serde(default)]
    pub table_name: Option<String>,
    /// Only rows of this kind: `Added`, `Modified` or `Deleted`.
    #[serde(default)]
    pub change_kind: Option<String>,
}

impl ChangeLogQuery {
    /// Pagination part of the query.
    #[must_use]
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// Store filter built from the query.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidRequest`] for an unknown change kind.
    pub fn filter(&self) -> Result<ChangeLogFilter, AuditError> {
        let change_kind = self
            .change_kind
            .as_deref()
            .map(str::parse::<ChangeKind>)
            .transpose()
            .map_err(AuditError::InvalidRequest)?;
        Ok(ChangeLogFilter {
            table_name: self.table_name.clone(),
            change_kind,
        })
    }
}

/// Paginated list response for `GET /change-logs`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChangeLogListResponse {
    /// Change logs on this page, newest first.
    pub data: Vec<ChangeLogRecord>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
