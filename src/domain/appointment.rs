//! Appointment entity, the main audited business record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::entity::Entity;

/// Lifecycle state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AppointmentStatus {
    /// Slot reserved.
    Booked,
    /// Patient checked in and was seen.
    Completed,
    /// Cancelled by patient or clinic.
    Cancelled,
    /// Patient did not show up.
    NoShow,
}

/// A booked slot with a doctor.
///
/// Field names double as column names of the `appointments` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    /// Primary key. `None` until inserted.
    pub id: Option<i64>,
    /// Patient the slot is booked for.
    pub patient_id: i64,
    /// Doctor seeing the patient.
    pub doctor_id: i64,
    /// Start of the slot.
    pub scheduled_at: DateTime<Utc>,
    /// Slot length in minutes.
    pub duration_minutes: i32,
    /// Current lifecycle state.
    pub status: AppointmentStatus,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Stamped on insert by the unit of work.
    pub created_at: Option<DateTime<Utc>>,
    /// Stamped on update by the unit of work.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// Creates a new, not yet persisted, booked appointment.
    #[must_use]
    pub fn book(
        patient_id: i64,
        doctor_id: i64,
        scheduled_at: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Self {
        Self {
            id: None,
            patient_id,
            doctor_id,
            scheduled_at,
            duration_minutes,
            status: AppointmentStatus::Booked,
            notes: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Entity for Appointment {
    const TYPE_NAME: &'static str = "Appointment";
    const TABLE: &'static str = "appointments";

    fn key(&self) -> Option<i64> {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_starts_unsaved_and_booked() {
        let a = Appointment::book(1, 2, Utc::now(), 30);
        assert_eq!(a.key(), None);
        assert_eq!(a.status, AppointmentStatus::Booked);
    }

    #[test]
    fn status_serializes_as_variant_name() {
        let json = serde_json::to_value(AppointmentStatus::Cancelled).ok();
        assert_eq!(json, Some(serde_json::json!("Cancelled")));
    }
}
