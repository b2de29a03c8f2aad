//! HTTP server setup.

use crate::config::{Config, ServerConfig};
use crate::engine::Engine;
use crate::locks::DirLocks;
use crate::routes;
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub locks: DirLocks,
    /// Timeout for GO enrichment, which runs longer than the other analyses.
    pub enrichment_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(engine: Engine, enrichment_timeout: Option<Duration>) -> Self {
        Self {
            engine: Arc::new(engine),
            locks: DirLocks::new(),
            enrichment_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Engine::new(config.engine.engine_config()),
            config.engine.enrichment_timeout(),
        )
    }
}

/// Build the application router.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .nest("/api", routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        );

    if config.cors {
        app = app.layer(CorsLayer::permissive());
    }

    app.with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "omicsgw is running",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Bind and serve until Ctrl-C.
pub async fn run_server(config: &Config) -> Result<()> {
    let state = AppState::from_config(config);
    let app = build_router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
