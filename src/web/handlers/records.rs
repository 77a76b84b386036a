use axum::{
    extract::{Query, State},
    response::Response,
};
use serde::Serialize;

use crate::errors::{AppError, AppResult};
use crate::models::{Gender, RecordFilter, StoredRecord};
use crate::web::responses::handle_result;
use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct RecordList {
    pub count: usize,
    pub records: Vec<StoredRecord>,
}

/// List stored records. Filters: `scope`, `pool` (25/50), `gender`
/// (M/F/X/unknown), `disc` (discipline code), `limit`.
pub async fn list_records(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> Response {
    handle_result(load_records(&state, filter).await)
}

async fn load_records(state: &AppState, filter: RecordFilter) -> AppResult<RecordList> {
    validate_filter(&filter)?;
    let records = state.database.list_records(&filter).await?;
    Ok(RecordList {
        count: records.len(),
        records,
    })
}

fn validate_filter(filter: &RecordFilter) -> Result<(), AppError> {
    if let Some(pool) = filter.pool {
        if pool != 25 && pool != 50 {
            return Err(AppError::validation(format!(
                "pool must be 25 or 50, got {}",
                pool
            )));
        }
    }

    if let Some(gender) = filter.gender.as_deref().filter(|g| !g.is_empty()) {
        Gender::from_code(gender).map_err(|_| {
            AppError::validation(format!(
                "gender must be one of M, F, X, unknown; got '{}'",
                gender
            ))
        })?;
    }

    Ok(())
}
