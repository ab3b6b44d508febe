//! Appointment DTOs for the audited CRUD endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Appointment, AppointmentStatus};
use crate::service::AppointmentPatch;

/// Request body for `POST /appointments`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BookAppointmentRequest {
    /// Patient the slot is booked for.
    pub patient_id: i64,
    /// Doctor seeing the patient.
    pub doctor_id: i64,
    /// Start of the slot.
    pub scheduled_at: DateTime<Utc>,
    /// Slot length in minutes.
    pub duration_minutes: i32,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

impl BookAppointmentRequest {
    /// Builds the unsaved entity.
    #[must_use]
    pub fn into_appointment(self) -> Appointment {
        Appointment {
            notes: self.notes,
            ..Appointment::book(
                self.patient_id,
                self.doctor_id,
                self.scheduled_at,
                self.duration_minutes,
            )
        }
    }
}

/// Request body for `PATCH /appointments/{id}`. Absent fields are kept.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAppointmentRequest {
    /// New start time.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// New slot length in minutes.
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    /// New lifecycle state.
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    /// Replacement notes.
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<UpdateAppointmentRequest> for AppointmentPatch {
    fn from(req: UpdateAppointmentRequest) -> Self {
        Self {
            scheduled_at: req.scheduled_at,
            duration_minutes: req.duration_minutes,
            status: req.status,
            notes: req.notes.map(Some),
        }
    }
}

/// Appointment as returned by the API.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AppointmentResponse {
    /// Appointment identifier.
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
    /// Creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Appointment> for AppointmentResponse {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            patient_id: a.patient_id,
            doctor_id: a.doctor_id,
            scheduled_at: a.scheduled_at,
            duration_minutes: a.duration_minutes,
            status: a.status,
            notes: a.notes,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}
