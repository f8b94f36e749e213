use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridx_api::config::ServerConfig;
use gridx_api::persistence::{PersistenceGateway, PgSnapshotWriter};
use gridx_api::router::build_app_router;
use gridx_api::state::AppState;
use gridx_api::ws;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridx_api=debug,gridx_db=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = connect_store(&config).await;

    // --- Snapshot persistence ---
    let persistence_cancel = CancellationToken::new();
    let (persistence, persistence_handle) = match &pool {
        Some(pool) => {
            let writer = Arc::new(PgSnapshotWriter::new(pool.clone()));
            let (gateway, handle) = PersistenceGateway::spawn(
                writer,
                config.persistence_queue_capacity,
                persistence_cancel.clone(),
            );
            (gateway, Some(handle))
        }
        None => (PersistenceGateway::disabled(), None),
    };

    // --- Connection hub ---
    let hub = Arc::new(ws::ConnectionHub::new(
        persistence,
        config.connection_queue_capacity,
    ));

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(
        Arc::clone(&hub),
        Duration::from_secs(config.heartbeat_interval_secs),
    );

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        hub: Arc::clone(&hub),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_hub = Arc::clone(&hub);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Upgraded sockets are not tracked by the server; close them here.
            shutdown_hub.shutdown_all().await;
        })
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    persistence_cancel.cancel();
    if let Some(handle) = persistence_handle {
        let wait = Duration::from_secs(config.shutdown_timeout_secs);
        if tokio::time::timeout(wait, handle).await.is_err() {
            tracing::warn!("Persistence worker did not flush before shutdown timeout");
        }
    }
    tracing::info!(snapshots = ?hub.persistence().counts(), "Graceful shutdown complete");

    Ok(())
}

/// Connect to the snapshot store and provision its schema.
///
/// The hub keeps running without persistence when `DATABASE_URL` is unset
/// or the store cannot be reached.
async fn connect_store(config: &ServerConfig) -> Option<gridx_db::DbPool> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, snapshot persistence disabled");
        return None;
    };

    let pool = match gridx_db::create_pool(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Database connection failed, snapshot persistence disabled");
            return None;
        }
    };
    tracing::info!("Database connection pool created");

    if let Err(e) = gridx_db::run_migrations(&pool).await {
        tracing::error!(error = %e, "Failed to run database migrations, snapshot persistence disabled");
        return None;
    }
    tracing::info!("Database migrations applied");

    Some(pool)
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
