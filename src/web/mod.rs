//! Web layer
//!
//! Thin axum handlers over the sync orchestrator and the record store.
//! Sync trigger responses keep the flat `{ok, ...}` summary shape; every
//! other endpoint answers with the [`ApiResponse`] envelope.

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::WebConfig;
use crate::database::Database;
use crate::ingestor::SyncOrchestrator;

pub mod auth;
pub mod handlers;
pub mod responses;

pub use responses::{handle_error, handle_result, ApiResponse};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub orchestrator: SyncOrchestrator,
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &WebConfig, state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("Listening on http://{}", self.addr);
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Build the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/sync",
            get(handlers::sync::trigger_sync).post(handlers::sync::trigger_sync),
        )
        .route("/sync/status", get(handlers::sync::sync_status))
        .route("/sync/runs", get(handlers::sync::list_runs))
        .route("/records", get(handlers::records::list_records))
        .route("/env-check", get(handlers::env::env_check))
}
