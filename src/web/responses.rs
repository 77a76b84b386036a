//! HTTP response types and error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::{AppError, AppResult, SyncError};
use crate::models::SyncSummary;

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Wrap a handler result into a response
pub fn handle_result<T>(result: AppResult<T>) -> Response
where
    T: Serialize,
{
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))).into_response(),
        Err(error) => handle_error(error),
    }
}

/// Convert AppError to an HTTP response with a matching status code
pub fn handle_error(error: AppError) -> Response {
    let (status, message) = match &error {
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone()),
        AppError::Configuration(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Configuration error: {}", e),
        ),
        AppError::Sync(e) => return sync_error_response(e),
        AppError::Database(e) => {
            error!("Database error while handling request: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database operation failed".to_string(),
            )
        }
        AppError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {}", message),
        ),
    };

    (status, Json(ApiResponse::<()>::error(message))).into_response()
}

/// Body of every non-200 sync trigger response that has no summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncErrorBody {
    pub ok: bool,
    pub error: String,
}

pub fn sync_error_response(error: &SyncError) -> Response {
    let status = match error {
        SyncError::Unauthorized => StatusCode::UNAUTHORIZED,
        SyncError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SyncError::AlreadyRunning => StatusCode::CONFLICT,
    };

    (
        status,
        Json(SyncErrorBody {
            ok: false,
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// A finished run answers 200, or 502 when no source could be fetched.
pub fn sync_summary_response(summary: SyncSummary) -> Response {
    let status = if summary.ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(summary)).into_response()
}
