//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::persistence::PageRequest;

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u64,
    /// Total number of pages.
    pub total_pages: u64,
}

impl PaginationMeta {
    /// Builds metadata for a page of `total` matching rows.
    #[must_use]
    pub fn new(page: PageRequest, total: u64) -> Self {
        Self {
            page: page.page,
            per_page: page.per_page,
            total,
            total_pages: total.div_ceil(u64::from(page.per_page.max(1))),
        }
    }
}

pub(crate) fn default_page() -> u32 {
    1
}

pub(crate) fn default_per_page() -> u32 {
    20
}

impl PaginationParams {
    /// Clamps `per_page` to the allowed maximum of 100.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 100),
        }
    }

    /// Converts the clamped parameters into a store page request.
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        let p = self.clamped();
        PageRequest {
            page: p.page,
            per_page: p.per_page,
        }
    }
}

/// Query parameters for retention purge endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct PurgeParams {
    /// Delete rows older than this many days (at least 1).
    pub older_than_days: u32,
}

/// Response body for retention purge endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PurgeResponse {
    /// Number of rows deleted.
    pub deleted: u64,
}
