//! Appointment service: audited CRUD over the sample business entity.
//!
//! Every mutation goes through a fresh [`UnitOfWork`], so each one produces
//! its change-log rows alongside the business write.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::entity::Entity;
use crate::domain::{Appointment, AppointmentStatus, RequestContext};
use crate::error::AuditError;
use crate::persistence::{ChangeLogStore, EntityStore, UnitOfWork};

/// Fields a caller may change on an existing appointment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentPatch {
    /// New start time.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// New slot length in minutes.
    pub duration_minutes: Option<i32>,
    /// New lifecycle state.
    pub status: Option<AppointmentStatus>,
    /// New notes. `Some(None)` clears them.
    pub notes: Option<Option<String>>,
}

impl AppointmentPatch {
    fn apply(self, appointment: &Appointment) -> Appointment {
        let mut next = appointment.clone();
        if let Some(at) = self.scheduled_at {
            next.scheduled_at = at;
        }
        if let Some(minutes) = self.duration_minutes {
            next.duration_minutes = minutes;
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(notes) = self.notes {
            next.notes = notes;
        }
        next
    }
}

/// Orchestrates appointment reads and audited writes.
#[derive(Debug, Clone)]
pub struct AppointmentService {
    entities: Arc<dyn EntityStore>,
    change_logs: Arc<dyn ChangeLogStore>,
}

impl AppointmentService {
    /// Creates a new `AppointmentService`.
    #[must_use]
    pub fn new(entities: Arc<dyn EntityStore>, change_logs: Arc<dyn ChangeLogStore>) -> Self {
        Self {
            entities,
            change_logs,
        }
    }

    fn unit_of_work(&self) -> UnitOfWork {
        UnitOfWork::new(Arc::clone(&self.entities), Arc::clone(&self.change_logs))
    }

    /// Books a new appointment.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidRequest`] for a non-positive duration, or
    /// a save error from [`UnitOfWork`].
    pub async fn book(
        &self,
        appointment: Appointment,
        ctx: &RequestContext,
    ) -> Result<Appointment, AuditError> {
        validate(&appointment)?;

        let mut uow = self.unit_of_work();
        uow.add(&appointment)?;
        let commit = uow.save_business_changes(ctx).await?;
        let id = commit.records.first().map(|r| r.record_id);
        uow.save_audit_records(commit).await?;

        let Some(id) = id else {
            return Err(AuditError::Internal(
                "insert produced no change record".to_string(),
            ));
        };
        tracing::info!(id, patient_id = appointment.patient_id, "appointment booked");
        self.get(id, ctx).await
    }

    /// Loads one appointment.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::AppointmentNotFound`] if no row has this id.
    pub async fn get(&self, id: i64, ctx: &RequestContext) -> Result<Appointment, AuditError> {
        let row = self
            .entities
            .load_row(Appointment::TABLE, id, ctx)
            .await?
            .ok_or(AuditError::AppointmentNotFound(id))?;
        serde_json::from_value(serde_json::Value::Object(row))
            .map_err(|e| AuditError::Internal(format!("malformed appointment row {id}: {e}")))
    }

    /// Applies `patch` to an existing appointment.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::AppointmentNotFound`] if the row is missing,
    /// [`AuditError::InvalidRequest`] if the result is invalid, or a save
    /// error from [`UnitOfWork`].
    pub async fn update(
        &self,
        id: i64,
        patch: AppointmentPatch,
        ctx: &RequestContext,
    ) -> Result<Appointment, AuditError> {
        let original = self.get(id, ctx).await?;
        let current = patch.apply(&original);
        validate(&current)?;

        let mut uow = self.unit_of_work();
        uow.modify(&original, &current)?;
        uow.save(ctx).await?;

        tracing::info!(id, status = ?current.status, "appointment updated");
        self.get(id, ctx).await
    }

    /// Deletes an appointment.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::AppointmentNotFound`] if the row is missing, or
    /// a save error from [`UnitOfWork`].
    pub async fn delete(&self, id: i64, ctx: &RequestContext) -> Result<(), AuditError> {
        let existing = self.get(id, ctx).await?;

        let mut uow = self.unit_of_work();
        uow.remove(&existing)?;
        uow.save(ctx).await?;

        tracing::info!(id, "appointment deleted");
        Ok(())
    }
}

fn validate(appointment: &Appointment) -> Result<(), AuditError> {
    if appointment.duration_minutes <= 0 {
        return Err(AuditError::InvalidRequest(format!(
            "duration_minutes must be positive, got {}",
            appointment.duration_minutes
        )));
    }
    Ok(())
}
