//! HTTP markup fetcher

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::retry::{with_retry, RetryConfig};
use super::MarkupFetcher;
use crate::config::SyncConfig;
use crate::errors::FetchError;

/// Fetches pages with a bounded timeout, retrying transient failures.
pub struct HttpFetcher {
    client: Client,
    retry: RetryConfig,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str, retry: RetryConfig) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client ({}), using defaults", e);
                Client::new()
            });

        Self { client, retry }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.fetch_timeout(),
            &config.user_agent,
            RetryConfig::with_retries(config.fetch_retries, config.retry_backoff()),
        )
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

#[async_trait]
impl MarkupFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        with_retry(&self.retry, || self.fetch_once(url), url).await
    }
}
