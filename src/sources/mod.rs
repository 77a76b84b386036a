//! Upstream markup sources
//!
//! The sync pipeline only needs raw markup for a URL. [`HttpFetcher`] gets it
//! over HTTP with timeouts and retries; [`StaticFetcher`] serves canned pages
//! and is used to run the pipeline without network access.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::errors::FetchError;

pub mod http;
pub mod retry;

pub use http::HttpFetcher;
pub use retry::RetryConfig;

/// Something that can produce the markup behind a source URL.
#[async_trait]
pub trait MarkupFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Serves fixed markup per URL; unknown URLs answer 404.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, Result<String, FetchError>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, markup: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(markup.to_string()));
        self
    }

    pub fn with_error(mut self, url: &str, error: FetchError) -> Self {
        self.pages.insert(url.to_string(), Err(error));
        self
    }
}

#[async_trait]
impl MarkupFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages.get(url).cloned().unwrap_or_else(|| {
            Err(FetchError::Http {
                url: url.to_string(),
                status: 404,
            })
        })
    }
}
