use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use school_api_rust::app::{app, AppState};
use school_api_rust::config::{config, StoreBackend, TenantDirectory};
use school_api_rust::database::{ConnectionRouter, Connector, MemoryConnector, PgConnector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = config().clone();

    // Request spans come from tower_http; silence them unless request logging is on
    let default_filter = if config.api.enable_request_logging {
        "school_api_rust=info,tower_http=info"
    } else {
        "school_api_rust=info,tower_http=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    info!("Starting school API in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        if school_api_rust::is_production!() {
            anyhow::bail!("JWT_SECRET must be set in production");
        }
        warn!("JWT_SECRET is empty; every session token will be rejected");
    }

    let directory = TenantDirectory::from_config(&config.database)
        .context("failed to load tenant directory")?;
    info!("Tenant directory lists {} domains", directory.domains().len());

    let connector: Arc<dyn Connector> = match config.database.backend {
        StoreBackend::Postgres => Arc::new(PgConnector::from_config(&config.database)),
        StoreBackend::Memory => {
            info!("Using in-memory document store; data is lost on exit");
            Arc::new(MemoryConnector::new())
        }
    };
    let router = Arc::new(ConnectionRouter::new(
        directory,
        connector,
        config.database.master_domain.clone(),
    ));

    let port = config.server.port;
    let state = AppState::new(config, router.clone());

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("School API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain pools before exit
    if tokio::time::timeout(Duration::from_secs(10), router.close_all())
        .await
        .is_err()
    {
        error!("Timed out closing tenant connections");
    }
    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
