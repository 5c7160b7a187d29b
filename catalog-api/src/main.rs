//! Catalog API Server Entry Point
//!
//! Bootstraps configuration and the tiered cache, starts the Axum HTTP
//! server, and flushes the catalog once more on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use catalog_api::telemetry::{init_tracing, TelemetryConfig};
use catalog_api::{build_cache, create_router, ApiError, ApiResult, AppState, ServiceConfig};
use catalog_storage::{spawn_periodic_flush, FlushOutcome};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    // A missing .env file is fine; real environment variables still apply.
    let dotenv = dotenvy::dotenv();

    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;
    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded environment from .env"),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }

    let config = ServiceConfig::from_env()?;
    let cache = Arc::new(build_cache(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let periodic = if config.periodic_flush {
        tracing::info!(
            interval_secs = config.flush_interval.as_secs(),
            "Starting periodic flush task"
        );
        Some(spawn_periodic_flush(
            cache.clone(),
            config.flush_interval,
            shutdown_rx,
        ))
    } else {
        None
    };

    let app = create_router(AppState::new(cache.clone()));

    let addr = config.bind_addr()?;
    tracing::info!(%addr, "Starting catalog API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = periodic {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Periodic flush task ended abnormally");
        }
    }

    match cache.force_flush().await {
        Ok(FlushOutcome::Flushed { rows }) => tracing::info!(rows, "Final flush complete"),
        Ok(FlushOutcome::Skipped(reason)) => {
            tracing::info!(reason = ?reason, "Final flush skipped")
        }
        Err(e) => tracing::error!(error = %e, "Final flush failed, unsaved changes lost"),
    }

    tracing::info!("Catalog API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
