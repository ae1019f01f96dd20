//! HTTP surface for the scraper and the dashboard, built on axum.
//!
//! - POST /api/atualizar-custos  ingest one sample
//! - GET  /api/custos/           formatted snapshot
//! - GET  /health                liveness

pub mod handlers;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::config::ServerConfig;
use crate::core::cost::ingest::IngestionService;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IngestionService>,
    pub started: std::time::Instant,
}

impl AppState {
    pub fn new(service: Arc<IngestionService>) -> Self {
        Self {
            service,
            started: std::time::Instant::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/atualizar-custos", post(handlers::post_costs))
        .route("/api/custos/", get(handlers::get_costs))
        .route("/api/custos", get(handlers::get_costs))
        .route("/health", get(handlers::get_health))
        .layer(TraceLayer::new_for_http())
        // The dashboard is served from another origin.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(
        store = %state.service.store().describe(),
        "listening on {addr}"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to install Ctrl-C handler: {e}");
        std::future::pending::<()>().await;
    }
}
