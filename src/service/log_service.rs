//! Log service: read access, retention purge, and writer statistics.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::domain::{ChangeLogRecord, QueryLogRecord, QueryLogStats};
use crate::error::AuditError;
use crate::instrumentation::{BackgroundLogWriter, WriterStats};
use crate::persistence::{
    ChangeLogFilter, ChangeLogStore, Page, PageRequest, QueryLogFilter, QueryLogStore,
};

/// Rows removed by one retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Change-log rows deleted.
    pub change_logs: u64,
    /// Query-log rows deleted.
    pub query_logs: u64,
}

/// Read and maintenance operations over both log tables.
///
/// Never writes log rows itself: change logs come from the unit of work and
/// query logs from the [`BackgroundLogWriter`].
#[derive(Debug, Clone)]
pub struct LogService {
    change_logs: Arc<dyn ChangeLogStore>,
    query_logs: Arc<dyn QueryLogStore>,
    writer: BackgroundLogWriter,
}

impl LogService {
    /// Creates a new `LogService`.
    #[must_use]
    pub fn new(
        change_logs: Arc<dyn ChangeLogStore>,
        query_logs: Arc<dyn QueryLogStore>,
        writer: BackgroundLogWriter,
    ) -> Self {
        Self {
            change_logs,
            query_logs,
            writer,
        }
    }

    /// Returns a handle to the background writer.
    #[must_use]
    pub fn writer(&self) -> &BackgroundLogWriter {
        &self.writer
    }

    /// Lists change logs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on storage failure.
    pub async fn list_change_logs(
        &self,
        filter: &ChangeLogFilter,
        page: PageRequest,
    ) -> Result<Page<ChangeLogRecord>, AuditError> {
        self.change_logs.list_change_logs(filter, page).await
    }

    /// Fetches one change log.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::ChangeLogNotFound`] if no row has this id.
    pub async fn get_change_log(&self, id: i64) -> Result<ChangeLogRecord, AuditError> {
        self.change_logs
            .get_change_log(id)
            .await?
            .ok_or(AuditError::ChangeLogNotFound(id))
    }

    /// Deletes change logs older than `older_than_days`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidRequest`] for a zero or out-of-range age, or
    /// [`AuditError::Persistence`] on storage failure.
    pub async fn purge_change_logs(&self, older_than_days: u32) -> Result<u64, AuditError> {
        let before = cutoff(older_than_days)?;
        let deleted = self.change_logs.purge_change_logs(before).await?;
        tracing::info!(deleted, older_than_days, "change logs purged");
        Ok(deleted)
    }

    /// Lists query logs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on storage failure.
    pub async fn list_query_logs(
        &self,
        filter: QueryLogFilter,
        page: PageRequest,
    ) -> Result<Page<QueryLogRecord>, AuditError> {
        self.query_logs.list_query_logs(filter, page).await
    }

    /// Fetches one query log.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::QueryLogNotFound`] if no row has this id.
    pub async fn get_query_log(&self, id: i64) -> Result<QueryLogRecord, AuditError> {
        self.query_logs
            .get_query_log(id)
            .await?
            .ok_or(AuditError::QueryLogNotFound(id))
    }

    /// Aggregate statistics over all query logs.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Persistence`] on storage failure.
    pub async fn query_log_stats(&self) -> Result<QueryLogStats, AuditError> {
        self.query_logs.query_log_stats().await
    }

    /// Deletes query logs older than `older_than_days`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidRequest`] for a zero or out-of-range age, or
    /// [`AuditError::Persistence`] on storage failure.
    pub async fn purge_query_logs(&self, older_than_days: u32) -> Result<u64, AuditError> {
        let before = cutoff(older_than_days)?;
        let deleted = self.query_logs.purge_query_logs(before).await?;
        tracing::info!(deleted, older_than_days, "query logs purged");
        Ok(deleted)
    }

    /// Purges both log tables.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the change-log purge runs first.
    pub async fn purge_expired(&self, retention_days: u32) -> Result<PurgeOutcome, AuditError> {
        Ok(PurgeOutcome {
            change_logs: self.purge_change_logs(retention_days).await?,
            query_logs: self.purge_query_logs(retention_days).await?,
        })
    }

    /// Current background writer counters.
    #[must_use]
    pub fn writer_stats(&self) -> WriterStats {
        self.writer.stats()
    }

    /// Spawns a task purging both log tables every `interval`.
    ///
    /// Returns `None` when `retention_days` is zero or too large to subtract
    /// from the current time. Failures are logged and retried on the next
    /// tick.
    #[must_use]
    pub fn spawn_retention_task(
        &self,
        retention_days: u32,
        interval: Duration,
    ) -> Option<JoinHandle<()>> {
        if retention_days == 0 {
            tracing::info!("log retention disabled");
            return None;
        }
        if let Err(e) = cutoff(retention_days) {
            tracing::error!(error = %e, retention_days, "log retention disabled");
            return None;
        }
        let service = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match service.purge_expired(retention_days).await {
                    Ok(outcome) => tracing::debug!(
                        change_logs = outcome.change_logs,
                        query_logs = outcome.query_logs,
                        "retention pass complete"
                    ),
                    Err(e) => tracing::error!(error = %e, "retention pass failed"),
                }
            }
        }))
    }
}

fn cutoff(older_than_days: u32) -> Result<chrono::DateTime<Utc>, AuditError> {
    if older_than_days == 0 {
        return Err(AuditError::InvalidRequest(
            "older_than_days must be at least 1".to_string(),
        ));
    }
    chrono::Duration::try_days(i64::from(older_than_days))
        .and_then(|age| Utc::now().checked_sub_signed(age))
        .ok_or_else(|| {
            AuditError::InvalidRequest(format!(
                "older_than_days {older_than_days} reaches past the earliest representable time"
            ))
        })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::WriterSettings;
    use crate::domain::entity::FieldMap;
    use crate::domain::{ChangeKind, CommandKind, NewChangeLog, NewQueryLog, RequestContext};
    use crate::persistence::MemoryStore;

    fn make_service() -> (Arc<MemoryStore>, LogService) {
        let store = Arc::new(MemoryStore::new());
        let writer = BackgroundLogWriter::spawn(
            Arc::clone(&store) as Arc<dyn QueryLogStore>,
            WriterSettings::default(),
        );
        let service = LogService::new(
            Arc::clone(&store) as Arc<dyn ChangeLogStore>,
            Arc::clone(&store) as Arc<dyn QueryLogStore>,
            writer,
        );
        (store, service)
    }

    fn change_log(age_days: i64) -> NewChangeLog {
        NewChangeLog {
            user_id: None,
            entity_type_name: "Appointment".to_string(),
            table_name: "appointments".to_string(),
            record_id: 1,
            change_kind: ChangeKind::Added,
            changed_field_names: Vec::new(),
            old_values: FieldMap::new(),
            new_values: FieldMap::new(),
            timestamp: Utc::now() - chrono::Duration::days(age_days),
            client_address: None,
        }
    }

    fn query_log(age_days: i64) -> NewQueryLog {
        NewQueryLog {
            user_id: None,
            command_text: "SELECT 1".to_string(),
            parameters: None,
            duration_ms: 1500,
            issued_at: Utc::now() - chrono::Duration::days(age_days),
            command_kind: CommandKind::Select,
            tables_referenced: None,
            client_address: None,
            endpoint: None,
            is_heavy: true,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn missing_rows_map_to_not_found() {
        let (_, service) = make_service();
        assert!(matches!(
            service.get_change_log(7).await,
            Err(AuditError::ChangeLogNotFound(7))
        ));
        assert!(matches!(
            service.get_query_log(8).await,
            Err(AuditError::QueryLogNotFound(8))
        ));
    }

    #[tokio::test]
    async fn purge_expired_respects_retention() {
        let (store, service) = make_service();
        let Ok(_) = store
            .insert_change_logs(
                &[change_log(40), change_log(1)],
                &RequestContext::background(),
            )
            .await
        else {
            panic!("insert failed");
        };
        for age in [45, 31, 2] {
            let Ok(_) = store.insert_query_log(&query_log(age)).await else {
                panic!("insert failed");
            };
        }

        let Ok(outcome) = service.purge_expired(30).await else {
            panic!("purge failed");
        };
        assert_eq!(
            outcome,
            PurgeOutcome {
                change_logs: 1,
                query_logs: 2
            }
        );
        assert_eq!(store.change_logs().await.len(), 1);
        assert_eq!(store.query_logs().await.len(), 1);
    }

    #[tokio::test]
    async fn zero_day_purge_is_rejected() {
        let (_, service) = make_service();
        assert!(matches!(
            service.purge_change_logs(0).await,
            Err(AuditError::InvalidRequest(_))
        ));
        assert!(service.spawn_retention_task(0, Duration::from_secs(1)).is_none());
    }

    #[tokio::test]
    async fn out_of_range_purge_age_is_rejected() {
        let (_, service) = make_service();
        assert!(matches!(
            service.purge_query_logs(u32::MAX).await,
            Err(AuditError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.purge_change_logs(u32::MAX).await,
            Err(AuditError::InvalidRequest(_))
        ));
        assert!(
            service
                .spawn_retention_task(u32::MAX, Duration::from_secs(1))
                .is_none()
        );
        assert!(service.purge_query_logs(36_500).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn retention_task_purges_on_tick() {
        let (store, service) = make_service();
        let Ok(_) = store.insert_query_log(&query_log(90)).await else {
            panic!("insert failed");
        };

        let Some(handle) = service.spawn_retention_task(30, Duration::from_secs(60)) else {
            panic!("retention should be enabled");
        };
        // The first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.query_logs().await.is_empty());
        handle.abort();
    }
}
