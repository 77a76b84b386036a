//! Error handling for the record sync service
//!
//! The taxonomy mirrors how a sync run degrades: configuration problems abort
//! before anything is fetched, fetch failures are recorded per source, row
//! level problems are counted as skips (see [`crate::models::SkipReason`]) and
//! store rejections are counted per batch.

pub mod types;

pub use types::*;

/// Result alias for web-facing operations
pub type AppResult<T> = Result<T, AppError>;
