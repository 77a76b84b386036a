//! Error type definitions for the record sync service

use thiserror::Error;

/// Top-level application error type used by the web layer
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Sync run errors
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Configuration errors outside of a sync run
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Validation errors for request parameters
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Missing or invalid configuration. Fatal for a run: nothing is fetched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sync secret is not configured")]
    MissingSecret,

    #[error("no source URLs are configured")]
    MissingSources,

    #[error("invalid source URL '{url}': {message}")]
    InvalidSourceUrl { url: String, message: String },

    #[error("database URL is not configured")]
    MissingDatabaseUrl,

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("failed to load configuration: {message}")]
    Load { message: String },
}

/// Failure to obtain markup for one source. Recorded, the source is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network connection timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Non-success HTTP status from the upstream server
    #[error("HTTP error: {status} from {url}")]
    Http { url: String, status: u16 },

    /// Connection refused, DNS failure and similar transport errors
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// Body could not be read or decoded
    #[error("Unreadable response body from {url}: {message}")]
    Body { url: String, message: String },
}

/// Store rejected a batch. Counted; the run continues with the next batch.
#[derive(Error, Debug)]
pub enum UpsertError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Batch {batch} rejected: {message}")]
    BatchRejected { batch: usize, message: String },
}

/// Errors that stop a sync run before any source is fetched
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("a sync run is already in progress")]
    AlreadyRunning,
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<::config::ConfigError> for ConfigError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Load {
            message: err.to_string(),
        }
    }
}

impl FetchError {
    /// URL of the source that failed
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Http { url, .. }
            | Self::Transport { url, .. }
            | Self::Body { url, .. } => url,
        }
    }

    /// Short machine-readable kind used in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Http { .. } => "http",
            Self::Transport { .. } => "transport",
            Self::Body { .. } => "body",
        }
    }

    /// Timeouts, transport errors, 429 and 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Body { .. } => false,
        }
    }

    /// Map a reqwest error onto the fetch taxonomy
    pub fn from_reqwest<U: Into<String>>(url: U, err: &reqwest::Error) -> Self {
        let url = url.into();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if let Some(status) = err.status() {
            Self::Http {
                url,
                status: status.as_u16(),
            }
        } else if err.is_body() || err.is_decode() {
            Self::Body {
                url,
                message: err.to_string(),
            }
        } else {
            Self::Transport {
                url,
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_retry_policy() {
        let url = "https://example.org/records".to_string();

        assert!(FetchError::Timeout { url: url.clone() }.is_retryable());
        assert!(FetchError::Http { url: url.clone(), status: 503 }.is_retryable());
        assert!(FetchError::Http { url: url.clone(), status: 429 }.is_retryable());
        assert!(!FetchError::Http { url: url.clone(), status: 404 }.is_retryable());
        assert!(!FetchError::Body { url, message: "bad utf-8".into() }.is_retryable());
    }

    #[test]
    fn test_fetch_error_exposes_url_and_kind() {
        let err = FetchError::Http {
            url: "https://a.example/wr".into(),
            status: 500,
        };
        assert_eq!(err.url(), "https://a.example/wr");
        assert_eq!(err.kind(), "http");
        assert_eq!(err.to_string(), "HTTP error: 500 from https://a.example/wr");
    }
}
