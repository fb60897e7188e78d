//! Cacher - A lightweight in-memory key/value server
//!
//! Provides Redis-like get/set/delete over a line-oriented TCP protocol, with
//! per-key expiration tracked in time buckets and swept by background janitors.

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cacher::{serve, AppState, Config};

/// Main entry point for the Cacher server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Set up both caches and their janitors
/// 4. Start the janitors
/// 5. Serve the line protocol on the configured address
/// 6. On SIGINT/SIGTERM, stop accepting and wait for the janitors to exit
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cacher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cacher server");

    // Load configuration from environment variables
    let config = Config::from_env();
    info!(
        "Configuration loaded: addr={}, workers={}, default_ttl={}s, main precision/interval={}s/{}s, sync precision/interval={}s/{}s",
        config.bind_addr(),
        config.nbr_workers,
        config.default_ttl,
        config.main_precision,
        config.main_janitor_interval,
        config.sync_precision,
        config.sync_janitor_interval
    );

    let state = AppState::from_config(&config).context("invalid cache configuration")?;
    state.manager.start_janitors()?;
    info!("Caches initialized, janitors running");

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
    info!("Server listening on {}", listener.local_addr()?);

    serve(listener, state.clone(), config.nbr_workers, shutdown_signal()).await?;

    state.manager.stop_janitors().await?;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
