//! Store-level request and result types.

use serde::Serialize;

use crate::domain::ChangeKind;
use crate::domain::entity::FieldMap;

/// One row-level write produced by the unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityChange {
    /// Insert a new row; the store assigns the key.
    Insert {
        /// Target table.
        table: String,
        /// Column values, without the generated key.
        values: FieldMap,
    },
    /// Update the listed columns of an existing row.
    Update {
        /// Target table.
        table: String,
        /// Primary key of the row.
        key: i64,
        /// Columns to set.
        values: FieldMap,
    },
    /// Delete an existing row.
    Delete {
        /// Target table.
        table: String,
        /// Primary key of the row.
        key: i64,
    },
}

impl EntityChange {
    /// Returns the target table.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Insert { table, .. } | Self::Update { table, .. } | Self::Delete { table, .. } => {
                table
            }
        }
    }
}

/// Outcome of one [`EntityChange`], in input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedChange {
    /// Key of the affected row (generated for inserts).
    pub record_id: i64,
    /// Rows the statement affected.
    pub rows_affected: u64,
}

/// Filter for change-log listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLogFilter {
    /// Only rows for this table.
    pub table_name: Option<String>,
    /// Only rows of this kind.
    pub change_kind: Option<ChangeKind>,
}

/// Filter for query-log listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryLogFilter {
    /// Only heavy queries.
    pub heavy_only: bool,
}

/// 1-indexed page selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number, starting at 1.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
}

impl PageRequest {
    /// Rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * (self.per_page as u64)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Rows on this page, newest first.
    pub items: Vec<T>,
    /// Rows matching the filter across all pages.
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(PageRequest { page: 1, per_page: 20 }.offset(), 0);
        assert_eq!(PageRequest { page: 3, per_page: 10 }.offset(), 20);
        assert_eq!(PageRequest { page: 0, per_page: 10 }.offset(), 0);
    }
}
