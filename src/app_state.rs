//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::{AppointmentService, LogService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Audited appointment writes.
    pub appointment_service: Arc<AppointmentService>,
    /// Log reads, purge, and writer statistics.
    pub log_service: Arc<LogService>,
}
