//! Query-log DTOs for list, detail, and statistics endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::{PaginationMeta, PaginationParams, default_page, default_per_page};
use crate::domain::QueryLogRecord;
use crate::persistence::QueryLogFilter;

/// Query parameters for `GET /query-logs`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct QueryLogQuery {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Only heavy queries.
    #[serde(default)]
    pub heavy_only: bool,
}

impl QueryLogQuery {
    /// Pagination part of the query.
    #[must_use]
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// Store filter built from the query.
    #[must_use]
    pub fn filter(&self) -> QueryLogFilter {
        QueryLogFilter {
            heavy_only: self.heavy_only,
        }
    }
}

/// Paginated list response for `GET /query-logs`.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueryLogListResponse {
    /// Query logs on this page, newest first.
    pub data: Vec<QueryLogRecord>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
