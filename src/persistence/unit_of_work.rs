//! Auditing unit of work.
//!
//! [`UnitOfWork`] collects entity mutations, commits them as one primary
//! write, and then writes one change-log row per mutated entity as a second,
//! separate write. The two phases are exposed as
//! [`UnitOfWork::save_business_changes`] and [`UnitOfWork::save_audit_records`];
//! [`UnitOfWork::save`] runs both.
//!
//! ```text
//! add / modify / remove ──► tracked snapshots
//!                              │  save_business_changes
//!                              ├─► stamp created_at / updated_at
//!                              ├─► diff into NewChangeLog (log tables skipped)
//!                              ├─► EntityStore::apply_changes  (atomic)
//!                              ▼
//!                         BusinessCommit
//!                              │  save_audit_records
//!                              └─► ChangeLogStore::insert_change_logs
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::models::{AppliedChange, EntityChange};
use super::{ChangeLogStore, EntityStore};
use crate::domain::entity::{
    CREATED_AT_FIELD, Entity, FieldMap, ID_FIELD, UPDATED_AT_FIELD, is_log_table, is_scalar,
    snapshot,
};
use crate::domain::{ChangeKind, NewChangeLog, RequestContext};
use crate::error::AuditError;

/// A tracked mutation, holding the snapshots taken when it was tracked.
#[derive(Debug, Clone)]
enum Tracked {
    Added {
        type_name: &'static str,
        table: &'static str,
        values: FieldMap,
    },
    Modified {
        type_name: &'static str,
        table: &'static str,
        key: i64,
        original: FieldMap,
        current: FieldMap,
    },
    Deleted {
        type_name: &'static str,
        table: &'static str,
        key: i64,
        values: FieldMap,
    },
}

impl Tracked {
    const fn table(&self) -> &'static str {
        match self {
            Self::Added { table, .. } | Self::Modified { table, .. } | Self::Deleted { table, .. } => {
                *table
            }
        }
    }
}

/// Result of the primary save, carrying the audit rows still to be written.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "change-log records are lost unless passed to save_audit_records"]
pub struct BusinessCommit {
    /// Rows affected by the committed business write.
    pub affected_rows: u64,
    /// One record per mutated non-log entity, in tracking order.
    pub records: Vec<NewChangeLog>,
    /// Caller context the change-log insert is attributed to.
    pub context: RequestContext,
}

/// One logical unit of work over business entities.
///
/// Not shareable across concurrent saves: the save methods take
/// `&mut self`. Create one per request.
#[derive(Debug)]
pub struct UnitOfWork {
    entities: Arc<dyn EntityStore>,
    change_logs: Arc<dyn ChangeLogStore>,
    tracked: Vec<Tracked>,
}

impl UnitOfWork {
    /// Creates an empty unit of work.
    #[must_use]
    pub fn new(entities: Arc<dyn EntityStore>, change_logs: Arc<dyn ChangeLogStore>) -> Self {
        Self {
            entities,
            change_logs,
            tracked: Vec::new(),
        }
    }

    /// Tracks `entity` for insertion.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidEntity`] if the entity cannot be
    /// snapshotted.
    pub fn add<E: Entity>(&mut self, entity: &E) -> Result<(), AuditError> {
        let values = snapshot(entity)?;
        self.tracked.push(Tracked::Added {
            type_name: E::TYPE_NAME,
            table: E::TABLE,
            values,
        });
        Ok(())
    }

    /// Tracks an update from `original` to `current`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidEntity`] if either side lacks a key, the
    /// keys differ, or the entity cannot be snapshotted.
    pub fn modify<E: Entity>(&mut self, original: &E, current: &E) -> Result<(), AuditError> {
        let key = match (original.key(), current.key()) {
            (Some(a), Some(b)) if a == b => a,
            (Some(a), Some(b)) => {
                return Err(AuditError::InvalidEntity(format!(
                    "{} key changed from {a} to {b}",
                    E::TYPE_NAME
                )));
            }
            _ => {
                return Err(AuditError::InvalidEntity(format!(
                    "{} must be saved before it can be modified",
                    E::TYPE_NAME
                )));
            }
        };
        self.tracked.push(Tracked::Modified {
            type_name: E::TYPE_NAME,
            table: E::TABLE,
            key,
            original: snapshot(original)?,
            current: snapshot(current)?,
        });
        Ok(())
    }

    /// Tracks `entity` for deletion.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidEntity`] if the entity has no key or
    /// cannot be snapshotted.
    pub fn remove<E: Entity>(&mut self, entity: &E) -> Result<(), AuditError> {
        let key = entity.key().ok_or_else(|| {
            AuditError::InvalidEntity(format!("{} has no key to delete", E::TYPE_NAME))
        })?;
        self.tracked.push(Tracked::Deleted {
            type_name: E::TYPE_NAME,
            table: E::TABLE,
            key,
            values: snapshot(entity)?,
        });
        Ok(())
    }

    /// Number of tracked, unsaved mutations.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracked.len()
    }

    /// Commits tracked mutations and returns the pending audit rows.
    ///
    /// On success the tracked set is cleared. On failure nothing was
    /// committed, no audit rows exist, and the mutations stay tracked.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::BusinessSave`] if the primary write fails.
    pub async fn save_business_changes(
        &mut self,
        ctx: &RequestContext,
    ) -> Result<BusinessCommit, AuditError> {
        let now = Utc::now();
        let mut changes = Vec::with_capacity(self.tracked.len());
        // (index into `changes`, record) for every audited entity.
        let mut pending = Vec::with_capacity(self.tracked.len());

        for tracked in &self.tracked {
            let (change, record) = plan(tracked, now, ctx);
            if !is_log_table(tracked.table()) {
                pending.push((changes.len(), record));
            }
            changes.push(change);
        }

        let applied = self
            .entities
            .apply_changes(&changes, ctx)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, changes = changes.len(), "business save failed");
                AuditError::BusinessSave(e.to_string())
            })?;

        self.tracked.clear();

        let affected_rows = applied.iter().map(|a| a.rows_affected).sum();
        let records = pending
            .into_iter()
            .map(|(idx, mut record)| {
                if record.change_kind == ChangeKind::Added {
                    record.record_id = applied
                        .get(idx)
                        .map_or(record.record_id, |a: &AppliedChange| a.record_id);
                }
                record
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            affected_rows,
            audit_records = records.len(),
            "business changes committed"
        );
        Ok(BusinessCommit {
            affected_rows,
            records,
            context: ctx.clone(),
        })
    }

    /// Writes the change-log rows of a committed save.
    ///
    /// Returns the business affected-row count carried by `commit`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::AuditWrite`] if the change-log write fails. The
    /// business data in `commit` is already committed at that point.
    pub async fn save_audit_records(&self, commit: BusinessCommit) -> Result<u64, AuditError> {
        let BusinessCommit {
            affected_rows,
            records,
            context,
        } = commit;
        if records.is_empty() {
            return Ok(affected_rows);
        }

        self.change_logs
            .insert_change_logs(&records, &context)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    committed_rows = affected_rows,
                    lost_records = records.len(),
                    "change log write failed after business commit"
                );
                AuditError::AuditWrite {
                    committed_rows: affected_rows,
                    reason: e.to_string(),
                }
            })?;

        Ok(affected_rows)
    }

    /// Commits tracked mutations and their change-log rows.
    ///
    /// Returns the business affected-row count.
    ///
    /// # Errors
    ///
    /// - [`AuditError::BusinessSave`] if the primary write fails; nothing
    ///   was committed.
    /// - [`AuditError::AuditWrite`] if the change-log write fails; business
    ///   data was committed.
    pub async fn save(&mut self, ctx: &RequestContext) -> Result<u64, AuditError> {
        let commit = self.save_business_changes(ctx).await?;
        self.save_audit_records(commit).await
    }
}

/// Builds the store write and the change-log record for one tracked entity.
///
/// `record_id` of an Added record is a placeholder until the store assigns
/// the key.
fn plan(tracked: &Tracked, now: DateTime<Utc>, ctx: &RequestContext) -> (EntityChange, NewChangeLog) {
    let stamp = serde_json::json!(now);
    let record = |type_name: &str, table: &str, record_id: i64, change_kind: ChangeKind| NewChangeLog {
        user_id: ctx.user_id.clone(),
        entity_type_name: type_name.to_string(),
        table_name: table.to_string(),
        record_id,
        change_kind,
        changed_field_names: Vec::new(),
        old_values: FieldMap::new(),
        new_values: FieldMap::new(),
        timestamp: now,
        client_address: ctx.client_address.clone(),
    };

    match tracked {
        Tracked::Added {
            type_name,
            table,
            values,
        } => {
            let mut values = values.clone();
            values.remove(ID_FIELD);
            if let Some(created_at) = values.get_mut(CREATED_AT_FIELD) {
                *created_at = stamp;
            }

            let mut rec = record(*type_name, *table, 0, ChangeKind::Added);
            rec.new_values = values
                .iter()
                .filter(|(k, _)| k.as_str() != CREATED_AT_FIELD)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            let change = EntityChange::Insert {
                table: (*table).to_string(),
                values,
            };
            (change, rec)
        }
        Tracked::Modified {
            type_name,
            table,
            key,
            original,
            current,
        } => {
            let mut rec = record(*type_name, *table, *key, ChangeKind::Modified);
            let mut set = FieldMap::new();

            for (field, new) in current {
                if field == ID_FIELD || field == UPDATED_AT_FIELD || !is_scalar(new) {
                    continue;
                }
                let old = original.get(field).unwrap_or(&serde_json::Value::Null);
                if !is_scalar(old) || old == new {
                    continue;
                }
                rec.changed_field_names.push(field.clone());
                rec.old_values.insert(field.clone(), old.clone());
                rec.new_values.insert(field.clone(), new.clone());
                set.insert(field.clone(), new.clone());
            }
            if current.contains_key(UPDATED_AT_FIELD) {
                set.insert(UPDATED_AT_FIELD.to_string(), stamp);
            }

            let change = EntityChange::Update {
                table: (*table).to_string(),
                key: *key,
                values: set,
            };
            (change, rec)
        }
        Tracked::Deleted {
            type_name,
            table,
            key,
            values,
        } => {
            let mut rec = record(*type_name, *table, *key, ChangeKind::Deleted);
            rec.old_values = values.clone();
            let change = EntityChange::Delete {
                table: (*table).to_string(),
                key: *key,
            };
            (change, rec)
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::domain::{Appointment, AppointmentStatus, ChangeLogRecord};
    use crate::persistence::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, UnitOfWork) {
        let store = Arc::new(MemoryStore::new());
        let uow = UnitOfWork::new(
            Arc::clone(&store) as Arc<dyn EntityStore>,
            Arc::clone(&store) as Arc<dyn ChangeLogStore>,
        );
        (store, uow)
    }

    fn appointment() -> Appointment {
        Appointment::book(10, 20, Utc::now(), 30)
    }

    /// Inserts an appointment and returns it with its assigned key.
    async fn persisted(store: &Arc<MemoryStore>) -> Appointment {
        let mut uow = UnitOfWork::new(
            Arc::clone(store) as Arc<dyn EntityStore>,
            Arc::clone(store) as Arc<dyn ChangeLogStore>,
        );
        let a = appointment();
        let Ok(()) = uow.add(&a) else {
            panic!("track failed");
        };
        let Ok(commit) = uow.save_business_changes(&RequestContext::background()).await else {
            panic!("save failed");
        };
        let Some(id) = commit.records.first().map(|r| r.record_id) else {
            panic!("expected a record");
        };
        Appointment { id: Some(id), ..a }
    }

    #[tokio::test]
    async fn added_entity_yields_one_added_record() {
        let (store, mut uow) = setup();
        let Ok(()) = uow.add(&appointment()) else {
            panic!("track failed");
        };

        let Ok(rows) = uow.save(&RequestContext::background()).await else {
            panic!("save failed");
        };
        assert_eq!(rows, 1);

        let logs = store.change_logs().await;
        assert_eq!(logs.len(), 1);
        let Some(log) = logs.first() else {
            panic!("expected one log");
        };
        assert_eq!(log.change_kind, ChangeKind::Added);
        assert_eq!(log.entity_type_name, "Appointment");
        assert_eq!(log.table_name, "appointments");
        assert_eq!(log.record_id, 1);
        assert!(store.row("appointments", log.record_id).await.is_some());

        for field in [
            "patient_id",
            "doctor_id",
            "scheduled_at",
            "duration_minutes",
            "status",
            "notes",
        ] {
            assert!(log.new_values.contains_key(field), "missing {field}");
        }
        assert!(!log.new_values.contains_key("id"));
        assert!(!log.new_values.contains_key("created_at"));
        assert!(log.old_values.is_empty());
        assert!(log.changed_field_names.is_empty());
    }

    #[tokio::test]
    async fn added_entity_gets_created_at_stamped() {
        let (store, mut uow) = setup();
        let Ok(()) = uow.add(&appointment()) else {
            panic!("track failed");
        };
        let _ = uow.save(&RequestContext::background()).await;

        let Some(row) = store.row("appointments", 1).await else {
            panic!("row missing");
        };
        assert!(row.get("created_at").is_some_and(|v| v.is_string()));
    }

    #[tokio::test]
    async fn status_change_yields_single_field_diff() {
        let (store, mut uow) = setup();
        let before = persisted(&store).await;
        let after = Appointment {
            status: AppointmentStatus::Cancelled,
            ..before.clone()
        };

        let Ok(()) = uow.modify(&before, &after) else {
            panic!("track failed");
        };
        let Ok(rows) = uow.save(&RequestContext::background()).await else {
            panic!("save failed");
        };
        assert_eq!(rows, 1);

        let logs = store.change_logs().await;
        let Some(log) = logs.last() else {
            panic!("expected a log");
        };
        assert_eq!(log.change_kind, ChangeKind::Modified);
        assert_eq!(log.changed_field_names, vec!["status".to_string()]);
        assert_eq!(
            serde_json::Value::Object(log.old_values.clone()),
            serde_json::json!({"status": "Booked"})
        );
        assert_eq!(
            serde_json::Value::Object(log.new_values.clone()),
            serde_json::json!({"status": "Cancelled"})
        );

        let Some(row) = store.row("appointments", log.record_id).await else {
            panic!("row missing");
        };
        assert_eq!(row.get("status"), Some(&serde_json::json!("Cancelled")));
        assert!(row.get("updated_at").is_some_and(|v| v.is_string()));
    }

    #[tokio::test]
    async fn updated_at_is_never_a_changed_field() {
        let (store, mut uow) = setup();
        let before = persisted(&store).await;
        let after = Appointment {
            updated_at: Some(Utc::now()),
            ..before.clone()
        };
        let Ok(()) = uow.modify(&before, &after) else {
            panic!("track failed");
        };
        let _ = uow.save(&RequestContext::background()).await;

        let logs = store.change_logs().await;
        let Some(log) = logs.last() else {
            panic!("expected a log");
        };
        assert_eq!(log.change_kind, ChangeKind::Modified);
        assert!(log.changed_field_names.is_empty());
    }

    #[tokio::test]
    async fn deleted_entity_snapshots_old_values() {
        let (store, mut uow) = setup();
        let existing = persisted(&store).await;

        let Ok(()) = uow.remove(&existing) else {
            panic!("track failed");
        };
        let Ok(rows) = uow.save(&RequestContext::background()).await else {
            panic!("save failed");
        };
        assert_eq!(rows, 1);

        let logs = store.change_logs().await;
        let Some(log) = logs.last() else {
            panic!("expected a log");
        };
        assert_eq!(log.change_kind, ChangeKind::Deleted);
        assert_eq!(log.old_values.get("id"), Some(&serde_json::json!(existing.id)));
        assert_eq!(log.old_values.get("status"), Some(&serde_json::json!("Booked")));
        assert!(log.new_values.is_empty());
        assert!(store.row("appointments", log.record_id).await.is_none());
    }

    #[tokio::test]
    async fn record_count_matches_mutations_and_skips_log_tables() {
        let (store, mut uow) = setup();
        let existing = persisted(&store).await;
        let doomed = persisted(&store).await;
        let logs_before = store.change_logs().await.len();

        let self_log = ChangeLogRecord {
            id: 99,
            user_id: None,
            entity_type_name: "Appointment".to_string(),
            table_name: "appointments".to_string(),
            record_id: 1,
            change_kind: ChangeKind::Added,
            changed_field_names: Vec::new(),
            old_values: FieldMap::new(),
            new_values: FieldMap::new(),
            timestamp: Utc::now(),
            client_address: None,
        };

        let ok = [
            uow.add(&appointment()),
            uow.add(&appointment()),
            uow.modify(
                &existing,
                &Appointment {
                    notes: Some("bring x-rays".to_string()),
                    ..existing.clone()
                },
            ),
            uow.remove(&doomed),
            uow.add(&self_log),
        ];
        assert!(ok.iter().all(Result::is_ok));

        let Ok(commit) = uow.save_business_changes(&RequestContext::background()).await else {
            panic!("save failed");
        };
        assert_eq!(commit.records.len(), 4);
        assert!(
            commit
                .records
                .iter()
                .all(|r| r.table_name != "change_logs" && r.table_name != "query_logs")
        );
        let kinds: Vec<ChangeKind> = commit.records.iter().map(|r| r.change_kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChangeKind::Added,
                ChangeKind::Added,
                ChangeKind::Modified,
                ChangeKind::Deleted
            ]
        );

        let Ok(_) = uow.save_audit_records(commit).await else {
            panic!("audit write failed");
        };
        assert_eq!(store.change_logs().await.len(), logs_before + 4);
    }

    #[tokio::test]
    async fn request_context_is_recorded() {
        let (store, mut uow) = setup();
        let ctx = RequestContext::background()
            .with_user("u-42")
            .with_client_address("10.0.0.7");
        let Ok(()) = uow.add(&appointment()) else {
            panic!("track failed");
        };
        let _ = uow.save(&ctx).await;

        let logs = store.change_logs().await;
        let Some(log) = logs.first() else {
            panic!("expected a log");
        };
        assert_eq!(log.user_id.as_deref(), Some("u-42"));
        assert_eq!(log.client_address.as_deref(), Some("10.0.0.7"));
    }

    #[tokio::test]
    async fn primary_failure_writes_no_audit_rows() {
        let (store, mut uow) = setup();
        let Ok(()) = uow.add(&appointment()) else {
            panic!("track failed");
        };
        store.fail_entity_writes(true);

        let result = uow.save(&RequestContext::background()).await;
        assert!(matches!(result, Err(AuditError::BusinessSave(_))));
        assert!(store.change_logs().await.is_empty());
        assert_eq!(uow.pending(), 1);

        store.fail_entity_writes(false);
        assert_eq!(uow.save(&RequestContext::background()).await.ok(), Some(1));
        assert_eq!(uow.pending(), 0);
        assert_eq!(store.change_logs().await.len(), 1);
    }

    #[tokio::test]
    async fn modify_of_missing_row_fails_atomically() {
        let (store, mut uow) = setup();
        let ghost = Appointment {
            id: Some(404),
            ..appointment()
        };
        let ok = [
            uow.add(&appointment()),
            uow.modify(
                &ghost,
                &Appointment {
                    status: AppointmentStatus::NoShow,
                    ..ghost.clone()
                },
            ),
        ];
        assert!(ok.iter().all(Result::is_ok));

        let result = uow.save(&RequestContext::background()).await;
        assert!(matches!(result, Err(AuditError::BusinessSave(_))));
        assert!(store.row("appointments", 1).await.is_none());
        assert!(store.change_logs().await.is_empty());
    }

    #[tokio::test]
    async fn audit_failure_surfaces_after_commit() {
        let (store, mut uow) = setup();
        let Ok(()) = uow.add(&appointment()) else {
            panic!("track failed");
        };
        store.fail_change_log_writes(true);

        let result = uow.save(&RequestContext::background()).await;
        let Err(AuditError::AuditWrite { committed_rows, .. }) = result else {
            panic!("expected AuditWrite, got {result:?}");
        };
        assert_eq!(committed_rows, 1);
        assert!(store.row("appointments", 1).await.is_some());
        assert!(store.change_logs().await.is_empty());
    }

    #[tokio::test]
    async fn empty_unit_of_work_saves_nothing() {
        let (store, mut uow) = setup();
        assert_eq!(uow.save(&RequestContext::background()).await.ok(), Some(0));
        assert!(store.change_logs().await.is_empty());
    }

    #[test]
    fn modify_requires_matching_keys() {
        let (_, mut uow) = setup();
        let unsaved = appointment();
        assert!(matches!(
            uow.modify(&unsaved, &unsaved),
            Err(AuditError::InvalidEntity(_))
        ));

        let a = Appointment {
            id: Some(1),
            ..appointment()
        };
        let b = Appointment { id: Some(2), ..a.clone() };
        assert!(matches!(uow.modify(&a, &b), Err(AuditError::InvalidEntity(_))));
        assert!(matches!(uow.remove(&unsaved), Err(AuditError::InvalidEntity(_))));
        assert_eq!(uow.pending(), 0);
    }

    #[tokio::test]
    async fn random_field_changes_round_trip() {
        let (store, _) = setup();
        let mut rng = rand::thread_rng();

        for _ in 0..25 {
            let before = persisted(&store).await;
            let old_minutes = before.duration_minutes;
            let new_minutes = old_minutes + rng.gen_range(1..=120);
            let after = Appointment {
                duration_minutes: new_minutes,
                ..before.clone()
            };

            let mut uow = UnitOfWork::new(
                Arc::clone(&store) as Arc<dyn EntityStore>,
                Arc::clone(&store) as Arc<dyn ChangeLogStore>,
            );
            let Ok(()) = uow.modify(&before, &after) else {
                panic!("track failed");
            };
            let Ok(commit) = uow.save_business_changes(&RequestContext::background()).await else {
                panic!("save failed");
            };
            let Some(rec) = commit.records.first() else {
                panic!("expected a record");
            };
            assert_eq!(
                rec.changed_field_names
                    .iter()
                    .filter(|f| f.as_str() == "duration_minutes")
                    .count(),
                1
            );
            assert_eq!(
                rec.old_values.get("duration_minutes"),
                Some(&serde_json::json!(old_minutes))
            );
            assert_eq!(
                rec.new_values.get("duration_minutes"),
                Some(&serde_json::json!(new_minutes))
            );
        }
    }
}
