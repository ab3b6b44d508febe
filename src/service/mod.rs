//! Service layer: business logic orchestration.
//!
//! [`AppointmentService`] drives audited writes through the unit of work;
//! [`LogService`] serves the change-log and query-log read surface and owns
//! retention.

pub mod appointment_service;
pub mod log_service;

pub use appointment_service::{AppointmentPatch, AppointmentService};
pub use log_service::{LogService, PurgeOutcome};
