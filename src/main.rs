//! appointment-audit server entry point.
//!
//! Starts the Axum HTTP server, the background query-log writer, and the
//! retention task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use appointment_audit::api;
use appointment_audit::app_state::AppState;
use appointment_audit::config::AuditConfig;
use appointment_audit::instrumentation::{BackgroundLogWriter, CommandInterceptor};
use appointment_audit::persistence::{
    ChangeLogStore, EntityStore, MemoryStore, PostgresStore, QueryLogStore,
};
use appointment_audit::service::{AppointmentService, LogService};

/// Store handles wired into the services.
struct Stores {
    entities: Arc<dyn EntityStore>,
    change_logs: Arc<dyn ChangeLogStore>,
    query_logs: Arc<dyn QueryLogStore>,
    writer: BackgroundLogWriter,
}

async fn postgres_stores(config: &AuditConfig) -> anyhow::Result<Stores> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    // The writer gets an interceptor-free store so its inserts are never
    // observed; business traffic goes through the intercepted clone.
    let plain = Arc::new(PostgresStore::new(pool));
    let writer = BackgroundLogWriter::spawn(
        Arc::clone(&plain) as Arc<dyn QueryLogStore>,
        config.writer,
    );
    let interceptor = Arc::new(CommandInterceptor::new(config.query_log, writer.clone()));
    let observed = Arc::new(plain.with_interceptor(interceptor));

    Ok(Stores {
        entities: Arc::clone(&observed) as Arc<dyn EntityStore>,
        change_logs: observed as Arc<dyn ChangeLogStore>,
        query_logs: plain as Arc<dyn QueryLogStore>,
        writer,
    })
}

fn memory_stores(config: &AuditConfig) -> Stores {
    tracing::warn!("PERSISTENCE_ENABLED=false, using in-memory store");
    let store = Arc::new(MemoryStore::new());
    let writer = BackgroundLogWriter::spawn(
        Arc::clone(&store) as Arc<dyn QueryLogStore>,
        config.writer,
    );
    Stores {
        entities: Arc::clone(&store) as Arc<dyn EntityStore>,
        change_logs: Arc::clone(&store) as Arc<dyn ChangeLogStore>,
        query_logs: store as Arc<dyn QueryLogStore>,
        writer,
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config =
        AuditConfig::from_env().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(
        addr = %config.listen_addr,
        persistence = config.persistence_enabled,
        query_log = config.query_log.enabled,
        heavy_threshold_ms = config.query_log.heavy_query_threshold_ms,
        "starting appointment-audit"
    );

    // Build persistence and instrumentation
    let stores = if config.persistence_enabled {
        postgres_stores(&config).await?
    } else {
        memory_stores(&config)
    };

    // Build service layer
    let appointment_service = Arc::new(AppointmentService::new(
        stores.entities,
        Arc::clone(&stores.change_logs),
    ));
    let log_service = Arc::new(LogService::new(
        stores.change_logs,
        stores.query_logs,
        stores.writer.clone(),
    ));
    let retention = log_service.spawn_retention_task(
        config.retention_days,
        Duration::from_secs(config.retention_interval_secs),
    );

    // Build application state
    let app_state = AppState {
        appointment_service,
        log_service,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Drain pending query logs before exiting
    if let Some(handle) = retention {
        handle.abort();
    }
    stores.writer.shutdown().await;

    Ok(())
}
