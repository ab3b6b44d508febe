//! REST endpoint handlers organized by resource.

pub mod appointments;
pub mod change_logs;
pub mod query_logs;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(appointments::routes())
        .merge(change_logs::routes())
        .merge(query_logs::routes())
        .merge(system::api_routes())
}
