//! Persistence layer: store traits, PostgreSQL and in-memory backends, and
//! the auditing unit of work.
//!
//! The three store traits split the data-access surface by concern:
//! [`EntityStore`] applies business writes, [`ChangeLogStore`] and
//! [`QueryLogStore`] own the two log tables. Both backends implement all
//! three so a single instance can be shared, while the background writer
//! can still be handed a separate, interceptor-free instance.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod unit_of_work;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entity::FieldMap;
use crate::domain::{
    ChangeLogRecord, NewChangeLog, NewQueryLog, QueryLogRecord, QueryLogStats, RequestContext,
};
use crate::error::AuditError;

pub use memory::MemoryStore;
pub use models::{
    AppliedChange, ChangeLogFilter, EntityChange, Page, PageRequest, QueryLogFilter,
};
pub use postgres::PostgresStore;
pub use unit_of_work::{BusinessCommit, UnitOfWork};

/// Applies business entity writes.
#[async_trait]
pub trait EntityStore: Send + Sync + std::fmt::Debug {
    /// Applies all `changes` in one transaction, in order.
    ///
    /// Returns one [`AppliedChange`] per input change. On error nothing is
    /// committed.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on any database failure,
    /// including an update or delete that matched no row.
    async fn apply_changes(
        &self,
        changes: &[EntityChange],
        ctx: &RequestContext,
    ) -> Result<Vec<AppliedChange>, AuditError>;

    /// Loads one row as a field map.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on database failure.
    async fn load_row(
        &self,
        table: &str,
        key: i64,
        ctx: &RequestContext,
    ) -> Result<Option<FieldMap>, AuditError>;
}

/// Append-only storage for change-log rows.
#[async_trait]
pub trait ChangeLogStore: Send + Sync + std::fmt::Debug {
    /// Inserts `records` as one batch, preserving order. The statement is
    /// attributed to `ctx` when the store is instrumented.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on database failure.
    async fn insert_change_logs(
        &self,
        records: &[NewChangeLog],
        ctx: &RequestContext,
    ) -> Result<u64, AuditError>;

    /// Lists change logs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on database failure.
    async fn list_change_logs(
        &self,
        filter: &ChangeLogFilter,
        page: PageRequest,
    ) -> Result<Page<ChangeLogRecord>, AuditError>;

    /// Fetches one change log by row id.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on database failure.
    async fn get_change_log(&self, id: i64) -> Result<Option<ChangeLogRecord>, AuditError>;

    /// Deletes change logs with `timestamp < before`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on database failure.
    async fn purge_change_logs(&self, before: DateTime<Utc>) -> Result<u64, AuditError>;
}

/// Append-only storage for query-log rows.
#[async_trait]
pub trait QueryLogStore: Send + Sync + std::fmt::Debug {
    /// Inserts one query log, returning its row id.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on database failure.
    async fn insert_query_log(&self, record: &NewQueryLog) -> Result<i64, AuditError>;

    /// Lists query logs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on database failure.
    async fn list_query_logs(
        &self,
        filter: QueryLogFilter,
        page: PageRequest,
    ) -> Result<Page<QueryLogRecord>, AuditError>;

    /// Fetches one query log by row id.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on database failure.
    async fn get_query_log(&self, id: i64) -> Result<Option<QueryLogRecord>, AuditError>;

    /// Aggregates over all query logs.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on database failure.
    async fn query_log_stats(&self) -> Result<QueryLogStats, AuditError>;

    /// Deletes query logs with `issued_at < before`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on database failure.
    async fn purge_query_logs(&self, before: DateTime<Utc>) -> Result<u64, AuditError>;
}
