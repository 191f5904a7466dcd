//! notify-relay: realtime notification gateway.
//!
//! Main entry point: loads configuration, installs logging, builds the
//! gateway session, and serves the WebSocket endpoint until shutdown.

mod error;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tracing_subscriber::{EnvFilter, fmt};

use relay_core::config::{AppConfig, LogFormat};
use relay_core::error::AppError;
use relay_realtime::GatewaySession;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(code = e.code, "Server error: {}", e.message);
        std::process::exit(1);
    }
}

/// Loads `config/default.toml`, `config/{RELAY_ENV}.toml`, and `RELAY__*` variables.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("RELAY_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

fn build_router(config: &AppConfig, session: Arc<GatewaySession>) -> Router {
    Router::new()
        .route(&config.server.ws_path, get(ws::ws_upgrade))
        .with_state(session)
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting notify-relay v{}", env!("CARGO_PKG_VERSION"));

    let session = GatewaySession::from_config(&config)?;
    let background = session.spawn_background_tasks();

    let app = build_router(&config, session.clone());

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!(addr = %addr, ws_path = %config.server.ws_path, "Relay listening");

    let shutdown_session = session.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, closing connections...");
            shutdown_session.shutdown();
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    for handle in background {
        if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
            tracing::warn!("Background task did not stop in time");
        }
    }

    tracing::info!("notify-relay shut down gracefully");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
