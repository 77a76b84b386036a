//! Health check handler

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::web::AppState;

/// Reports store connectivity; 503 when the database does not answer.
pub async fn health_check(State(state): State<AppState>) -> Response {
    let (status, database) = match state.database.ping().await {
        Ok(()) => (StatusCode::OK, "connected"),
        Err(e) => {
            warn!("Health check failed to reach database: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unreachable")
        }
    };

    let body = json!({
        "status": if status == StatusCode::OK { "healthy" } else { "unhealthy" },
        "database": database,
        "syncRunning": state.orchestrator.state().is_running(),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now(),
    });

    (status, Json(body)).into_response()
}
