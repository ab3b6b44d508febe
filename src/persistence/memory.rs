//! In-memory store used when PostgreSQL persistence is disabled.
//!
//! Mirrors the PostgreSQL backend's semantics: entity writes are applied
//! all-or-nothing, log tables are append-only with auto-increment ids, and
//! listings are newest first.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::models::{
    AppliedChange, ChangeLogFilter, EntityChange, Page, PageRequest, QueryLogFilter,
};
use super::{ChangeLogStore, EntityStore, QueryLogStore};
use crate::domain::entity::{FieldMap, ID_FIELD};
use crate::domain::{
    ChangeLogRecord, NewChangeLog, NewQueryLog, QueryLogRecord, QueryLogStats, RequestContext,
};
use crate::error::AuditError;

#[derive(Debug, Default, Clone)]
struct Table {
    rows: BTreeMap<i64, FieldMap>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Table>,
    change_logs: Vec<ChangeLogRecord>,
    query_logs: Vec<QueryLogRecord>,
    last_change_log_id: i64,
    last_query_log_id: i64,
}

#[cfg(test)]
#[derive(Debug, Default)]
struct Faults {
    entity_writes: std::sync::atomic::AtomicBool,
    change_log_writes: std::sync::atomic::AtomicBool,
    query_log_writes: std::sync::atomic::AtomicBool,
}

/// Process-local store backed by a `tokio::sync::RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    #[cfg(test)]
    faults: Faults,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of a business row, if present.
    pub async fn row(&self, table: &str, key: i64) -> Option<FieldMap> {
        let state = self.state.read().await;
        state.tables.get(table)?.rows.get(&key).cloned()
    }

    /// Returns every change log in insertion order.
    pub async fn change_logs(&self) -> Vec<ChangeLogRecord> {
        self.state.read().await.change_logs.clone()
    }

    /// Returns every query log in insertion order.
    pub async fn query_logs(&self) -> Vec<QueryLogRecord> {
        self.state.read().await.query_logs.clone()
    }

    #[cfg(test)]
    pub(crate) fn fail_entity_writes(&self, fail: bool) {
        self.faults
            .entity_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn fail_change_log_writes(&self, fail: bool) {
        self.faults
            .change_log_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn fail_query_log_writes(&self, fail: bool) {
        self.faults
            .query_log_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    fn check_fault(flag: &std::sync::atomic::AtomicBool, what: &str) -> Result<(), AuditError> {
        if flag.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AuditError::Persistence(format!("injected {what} failure")));
        }
        Ok(())
    }
}

/// Applies one change to a scratch copy of the tables.
fn apply_one(
    tables: &mut HashMap<String, Table>,
    change: &EntityChange,
) -> Result<AppliedChange, AuditError> {
    match change {
        EntityChange::Insert { table, values } => {
            let t = tables.entry(table.clone()).or_default();
            t.next_id = t.next_id.saturating_add(1);
            let id = t.next_id;
            let mut row = values.clone();
            row.insert(ID_FIELD.to_string(), serde_json::json!(id));
            t.rows.insert(id, row);
            Ok(AppliedChange {
                record_id: id,
                rows_affected: 1,
            })
        }
        EntityChange::Update { table, key, values } => {
            let row = tables
                .get_mut(table)
                .and_then(|t| t.rows.get_mut(key))
                .ok_or_else(|| {
                    AuditError::Persistence(format!("update matched no row: {table}#{key}"))
                })?;
            for (column, value) in values {
                row.insert(column.clone(), value.clone());
            }
            Ok(AppliedChange {
                record_id: *key,
                rows_affected: u64::from(!values.is_empty()),
            })
        }
        EntityChange::Delete { table, key } => {
            tables
                .get_mut(table)
                .and_then(|t| t.rows.remove(key))
                .ok_or_else(|| {
                    AuditError::Persistence(format!("delete matched no row: {table}#{key}"))
                })?;
            Ok(AppliedChange {
                record_id: *key,
                rows_affected: 1,
            })
        }
    }
}

fn paginate<T: Clone>(rows: Vec<&T>, page: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let items = rows
        .into_iter()
        .rev()
        .skip(skip)
        .take(page.per_page as usize)
        .cloned()
        .collect();
    Page { items, total }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn apply_changes(
        &self,
        changes: &[EntityChange],
        _ctx: &RequestContext,
    ) -> Result<Vec<AppliedChange>, AuditError> {
        #[cfg(test)]
        Self::check_fault(&self.faults.entity_writes, "entity write")?;

        let mut state = self.state.write().await;
        // Work on a copy so a failing change leaves every table untouched.
        let mut scratch = state.tables.clone();
        let applied = changes
            .iter()
            .map(|change| apply_one(&mut scratch, change))
            .collect::<Result<Vec<_>, _>>()?;
        state.tables = scratch;
        Ok(applied)
    }

    async fn load_row(
        &self,
        table: &str,
        key: i64,
        _ctx: &RequestContext,
    ) -> Result<Option<FieldMap>, AuditError> {
        Ok(self.row(table, key).await)
    }
}

#[async_trait]
impl ChangeLogStore for MemoryStore {
    async fn insert_change_logs(
        &self,
        records: &[NewChangeLog],
        _ctx: &RequestContext,
    ) -> Result<u64, AuditError> {
        #[cfg(test)]
        Self::check_fault(&self.faults.change_log_writes, "change log write")?;

        let mut state = self.state.write().await;
        for record in records {
            state.last_change_log_id = state.last_change_log_id.saturating_add(1);
            let id = state.last_change_log_id;
            state
                .change_logs
                .push(ChangeLogRecord::from_new(id, record.clone()));
        }
        Ok(records.len() as u64)
    }

    async fn list_change_logs(
        &self,
        filter: &ChangeLogFilter,
        page: PageRequest,
    ) -> Result<Page<ChangeLogRecord>, AuditError> {
        let state = self.state.read().await;
        let rows: Vec<&ChangeLogRecord> = state
            .change_logs
            .iter()
            .filter(|r| {
                filter
                    .table_name
                    .as_deref()
                    .is_none_or(|t| r.table_name.eq_ignore_ascii_case(t))
            })
            .filter(|r| filter.change_kind.is_none_or(|k| r.change_kind == k))
            .collect();
        Ok(paginate(rows, page))
    }

    async fn get_change_log(&self, id: i64) -> Result<Option<ChangeLogRecord>, AuditError> {
        let state = self.state.read().await;
        Ok(state.change_logs.iter().find(|r| r.id == id).cloned())
    }

    async fn purge_change_logs(&self, before: DateTime<Utc>) -> Result<u64, AuditError> {
        let mut state = self.state.write().await;
        let len = state.change_logs.len();
        state.change_logs.retain(|r| r.timestamp >= before);
        Ok((len - state.change_logs.len()) as u64)
    }
}

#[async_trait]
impl QueryLogStore for MemoryStore {
    async fn insert_query_log(&self, record: &NewQueryLog) -> Result<i64, AuditError> {
        #[cfg(test)]
        Self::check_fault(&self.faults.query_log_writes, "query log write")?;

        let mut state = self.state.write().await;
        state.last_query_log_id = state.last_query_log_id.saturating_add(1);
        let id = state.last_query_log_id;
        state
            .query_logs
            .push(QueryLogRecord::from_new(id, record.clone()));
        Ok(id)
    }

    async fn list_query_logs(
        &self,
        filter: QueryLogFilter,
        page: PageRequest,
    ) -> Result<Page<QueryLogRecord>, AuditError> {
        let state = self.state.read().await;
        let rows: Vec<&QueryLogRecord> = state
            .query_logs
            .iter()
            .filter(|r| !filter.heavy_only || r.is_heavy)
            .collect();
        Ok(paginate(rows, page))
    }

    async fn get_query_log(&self, id: i64) -> Result<Option<QueryLogRecord>, AuditError> {
        let state = self.state.read().await;
        Ok(state.query_logs.iter().find(|r| r.id == id).cloned())
    }

    async fn query_log_stats(&self) -> Result<QueryLogStats, AuditError> {
        let state = self.state.read().await;
        let logs = &state.query_logs;
        if logs.is_empty() {
            return Ok(QueryLogStats::default());
        }
        let total: i64 = logs.iter().map(|r| r.duration_ms).sum();
        #[allow(clippy::cast_precision_loss)]
        let avg = total as f64 / logs.len() as f64;
        Ok(QueryLogStats {
            total_queries: logs.len() as i64,
            heavy_queries: logs.iter().filter(|r| r.is_heavy).count() as i64,
            failed_queries: logs.iter().filter(|r| r.error_message.is_some()).count() as i64,
            avg_duration_ms: avg,
            max_duration_ms: logs.iter().map(|r| r.duration_ms).max().unwrap_or(0),
        })
    }

    async fn purge_query_logs(&self, before: DateTime<Utc>) -> Result<u64, AuditError> {
        let mut state = self.state.write().await;
        let len = state.query_logs.len();
        state.query_logs.retain(|r| r.issued_at >= before);
        Ok((len - state.query_logs.len()) as u64)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ChangeKind, CommandKind};

    fn insert(table: &str, name: &str) -> EntityChange {
        let mut values = FieldMap::new();
        values.insert("name".to_string(), serde_json::json!(name));
        EntityChange::Insert {
            table: table.to_string(),
            values,
        }
    }

    fn new_change_log(table: &str, kind: ChangeKind) -> NewChangeLog {
        NewChangeLog {
            user_id: None,
            entity_type_name: "Thing".to_string(),
            table_name: table.to_string(),
            record_id: 1,
            change_kind: kind,
            changed_field_names: Vec::new(),
            old_values: FieldMap::new(),
            new_values: FieldMap::new(),
            timestamp: Utc::now(),
            client_address: None,
        }
    }

    fn new_query_log(duration_ms: i64, is_heavy: bool, error: Option<&str>) -> NewQueryLog {
        NewQueryLog {
            user_id: None,
            command_text: "SELECT 1".to_string(),
            parameters: None,
            duration_ms,
            issued_at: Utc::now(),
            command_kind: CommandKind::Select,
            tables_referenced: None,
            client_address: None,
            endpoint: None,
            is_heavy,
            error_message: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_keys() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        let Ok(applied) = store
            .apply_changes(&[insert("t", "a"), insert("t", "b")], &ctx)
            .await
        else {
            panic!("apply failed");
        };
        let ids: Vec<i64> = applied.iter().map(|a| a.record_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(store.row("t", 2).await.is_some());
    }

    #[tokio::test]
    async fn failing_change_rolls_back_batch() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        let changes = vec![
            insert("t", "a"),
            EntityChange::Delete {
                table: "t".to_string(),
                key: 99,
            },
        ];
        assert!(store.apply_changes(&changes, &ctx).await.is_err());
        assert!(store.row("t", 1).await.is_none());
    }

    #[tokio::test]
    async fn empty_update_still_requires_the_row() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        let Ok(_) = store.apply_changes(&[insert("t", "a")], &ctx).await else {
            panic!("insert failed");
        };
        let empty = |key| EntityChange::Update {
            table: "t".to_string(),
            key,
            values: FieldMap::new(),
        };

        let Ok(applied) = store.apply_changes(&[empty(1)], &ctx).await else {
            panic!("empty update of an existing row should succeed");
        };
        assert_eq!(applied.first().map(|a| a.rows_affected), Some(0));
        assert!(store.apply_changes(&[empty(2)], &ctx).await.is_err());
    }

    #[tokio::test]
    async fn change_logs_filter_and_page_newest_first() {
        let store = MemoryStore::new();
        let records = vec![
            new_change_log("appointments", ChangeKind::Added),
            new_change_log("doctors", ChangeKind::Added),
            new_change_log("appointments", ChangeKind::Modified),
        ];
        let _ = store
            .insert_change_logs(&records, &RequestContext::background())
            .await;

        let filter = ChangeLogFilter {
            table_name: Some("appointments".to_string()),
            change_kind: None,
        };
        let Ok(page) = store
            .list_change_logs(&filter, PageRequest { page: 1, per_page: 1 })
            .await
        else {
            panic!("list failed");
        };
        assert_eq!(page.total, 2);
        let Some(first) = page.items.first() else {
            panic!("expected one item");
        };
        assert_eq!(first.change_kind, ChangeKind::Modified);
    }

    #[tokio::test]
    async fn stats_aggregate_query_logs() {
        let store = MemoryStore::new();
        let _ = store.insert_query_log(&new_query_log(1500, true, None)).await;
        let _ = store.insert_query_log(&new_query_log(500, false, Some("boom"))).await;

        let Ok(stats) = store.query_log_stats().await else {
            panic!("stats failed");
        };
        assert_eq!(stats.total_queries, 2);
        assert_eq!(stats.heavy_queries, 1);
        assert_eq!(stats.failed_queries, 1);
        assert_eq!(stats.max_duration_ms, 1500);
        assert!((stats.avg_duration_ms - 1000.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn purge_removes_only_older_rows() {
        let store = MemoryStore::new();
        let mut old = new_query_log(10, false, None);
        old.issued_at = Utc::now() - chrono::Duration::days(40);
        let _ = store.insert_query_log(&old).await;
        let _ = store.insert_query_log(&new_query_log(10, false, None)).await;

        let cutoff = Utc::now() - chrono::Duration::days(30);
        assert_eq!(store.purge_query_logs(cutoff).await.ok(), Some(1));
        assert_eq!(store.query_logs().await.len(), 1);
    }
}
