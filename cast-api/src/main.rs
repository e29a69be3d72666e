//! cast-api - HTTP triggers for the scheduled cast publisher
//!
//! Exposes the cron and manual trigger endpoints. Each request runs one
//! publishing batch and answers with its report.

mod app;
mod auth;
mod routes;

use anyhow::{Context, Result};
use libcastflow::logging::LoggingConfig;
use libcastflow::{Config, Publisher};
use tracing::{info, warn};

use crate::app::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    LoggingConfig::from_env(false).init();

    let mut config = Config::load().context("Failed to load configuration")?;
    let publisher = Publisher::from_config(&config)
        .await
        .context("Failed to initialize publisher")?;

    let cron_secret = config.server.cron_secret.take();
    if cron_secret.is_none() {
        warn!("No cron secret configured; /api/cron/process-scheduled will reject every request");
    }

    let state = AppState::new(publisher, cron_secret);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("cast-api listening on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("cast-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
