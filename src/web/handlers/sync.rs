//! Sync trigger, status and run history handlers

use axum::{
    extract::{Query, State},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::AppError;
use crate::ingestor::SyncRequest;
use crate::models::{SyncProgress, SyncRunRecord};
use crate::web::auth::SyncCredential;
use crate::web::responses::{
    handle_error, handle_result, sync_error_response, sync_summary_response,
};
use crate::web::AppState;

const DEFAULT_RUNS_LIMIT: u32 = 20;
const MAX_RUNS_LIMIT: u32 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct SyncParams {
    pub debug: Option<String>,
}

impl SyncParams {
    fn debug_enabled(&self) -> bool {
        matches!(
            self.debug.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("1" | "true" | "yes")
        )
    }
}

/// Run a sync now.
///
/// The run is spawned so it completes even if the caller disconnects.
pub async fn trigger_sync(
    State(state): State<AppState>,
    SyncCredential(credential): SyncCredential,
    Query(params): Query<SyncParams>,
) -> Response {
    let request = SyncRequest::http(credential, params.debug_enabled());
    info!("Sync triggered over HTTP (debug: {})", request.debug);

    let orchestrator = state.orchestrator.clone();
    match tokio::spawn(async move { orchestrator.run(request).await }).await {
        Ok(Ok(summary)) => sync_summary_response(summary),
        Ok(Err(e)) => sync_error_response(&e),
        Err(e) => {
            error!("Sync task panicked or was cancelled: {}", e);
            handle_error(AppError::internal("sync task did not complete"))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub running: bool,
    /// Current run, or the most recent one since start-up
    pub progress: Option<SyncProgress>,
}

pub async fn sync_status(State(state): State<AppState>) -> Response {
    let manager = state.orchestrator.state();
    let status = SyncStatus {
        running: manager.is_running(),
        progress: manager.current().await,
    };
    handle_result(Ok::<_, AppError>(status))
}

#[derive(Debug, Default, Deserialize)]
pub struct RunsParams {
    pub limit: Option<u32>,
}

pub async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<RunsParams>,
) -> Response {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RUNS_LIMIT)
        .clamp(1, MAX_RUNS_LIMIT);

    let result: Result<Vec<SyncRunRecord>, AppError> = state
        .database
        .list_runs(limit)
        .await
        .map_err(AppError::from);
    handle_result(result)
}
