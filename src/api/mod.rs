//! REST API layer: route handlers, DTOs, extractors, and router composition.
//!
//! All resource endpoints are mounted under `/api/v1`; `/health` sits at
//! the root.

pub mod dto;
pub mod extract;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "appointment-audit",
        description = "Audited appointment writes plus read access to change logs and query logs."
    ),
    paths(
        handlers::appointments::book_appointment,
        handlers::appointments::get_appointment,
        handlers::appointments::update_appointment,
        handlers::appointments::delete_appointment,
        handlers::change_logs::list_change_logs,
        handlers::change_logs::get_change_log,
        handlers::change_logs::purge_change_logs,
        handlers::query_logs::list_query_logs,
        handlers::query_logs::list_heavy_queries,
        handlers::query_logs::get_query_log,
        handlers::query_logs::query_log_stats,
        handlers::query_logs::purge_query_logs,
        handlers::system::health_handler,
        handlers::system::writer_stats_handler,
    ),
    tags(
        (name = "Appointments", description = "Audited CRUD over appointments"),
        (name = "Change logs", description = "Before/after snapshots of entity mutations"),
        (name = "Query logs", description = "Heavy, failing, or sampled database commands"),
        (name = "System", description = "Health and instrumentation"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
