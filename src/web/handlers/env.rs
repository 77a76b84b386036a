use axum::{extract::State, response::Response};
use serde::Serialize;

use crate::config::{parse_source_list, Config};
use crate::errors::AppError;
use crate::web::responses::handle_result;
use crate::web::AppState;

/// Which settings a sync run needs are present. Values are never echoed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvCheck {
    pub sync_secret: bool,
    pub sources: bool,
    pub database_url: bool,
    pub schedule: bool,
}

impl EnvCheck {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sync_secret: config.auth.secret().is_some(),
            sources: parse_source_list(&config.sync.sources).map_or(false, |s| !s.is_empty()),
            database_url: !config.database.url.trim().is_empty(),
            schedule: config
                .sync
                .schedule
                .as_deref()
                .map_or(false, |s| !s.trim().is_empty()),
        }
    }
}

pub async fn env_check(State(state): State<AppState>) -> Response {
    handle_result(Ok::<_, AppError>(EnvCheck::from_config(
        state.orchestrator.config(),
    )))
}
