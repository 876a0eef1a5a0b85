use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use signage_core::builder::ScenarioBuilder;
use signage_core::store::{MemoryScenarioStore, ScenarioStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signage_api::config::{ServerConfig, StoreBackend};
use signage_api::coordinator::Coordinator;
use signage_api::state::AppState;
use signage_api::{routes, ws};
use signage_db::{DbPool, PgScenarioStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "signage_api=debug,signage_db=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid configuration");
    tracing::info!(
        host = %config.host,
        port = config.port,
        scenario_timeout_ms = u64::try_from(config.scenario_timeout.as_millis()).unwrap_or(u64::MAX),
        display_offset = %config.display_offset,
        "Loaded server configuration"
    );
    if config.request_token.is_empty() {
        tracing::warn!("REQUEST_TOKEN is empty, any client can issue admin commands");
    }

    // --- Store ---
    let (store, pool): (Arc<dyn ScenarioStore>, Option<DbPool>) = match &config.store {
        StoreBackend::Postgres { database_url } => {
            let pool = signage_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            signage_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            signage_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            (Arc::new(PgScenarioStore::new(pool.clone())), Some(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory scenario store, scenarios are lost on restart");
            (Arc::new(MemoryScenarioStore::new()), None)
        }
    };

    // --- Message template ---
    let builder = match &config.message_template_path {
        Some(path) => {
            let builder =
                ScenarioBuilder::from_template_file(path).expect("Failed to read message template");
            tracing::info!(path = %path.display(), "Message template loaded");
            builder
        }
        None => ScenarioBuilder::default(),
    };

    // --- Coordinator ---
    let coordinator = Arc::new(Coordinator::from_config(&config, store, builder));

    // --- Heartbeat ---
    let heartbeat_handle =
        ws::start_heartbeat(Arc::clone(coordinator.hub()), config.heartbeat_interval);

    // --- Timeline ---
    let timeline_cancel = CancellationToken::new();
    let timeline_handle = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        let cancel = timeline_cancel.clone();
        async move { coordinator.run(cancel).await }
    });

    // --- Router ---
    let state = AppState {
        coordinator: Arc::clone(&coordinator),
    };
    let app = routes::app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    timeline_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), timeline_handle).await;
    tracing::info!("Timeline stopped");

    coordinator.hub().shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database pool closed");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
