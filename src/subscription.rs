//! Subscription source: fetches the descriptor blob over HTTP.

use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::endpoint::{decode_batch, BatchError, Endpoint};

/// Errors that abort a subscription refresh.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetching subscription failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("subscription responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Remote feed of endpoint descriptors.
#[derive(Debug, Clone)]
pub struct SubscriptionSource {
    url: Url,
    client: reqwest::Client,
}

impl SubscriptionSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("engine-supervisor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Download and decode the current endpoint set.
    pub async fn fetch(&self) -> Result<Vec<Endpoint>, FetchError> {
        let response = self.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        tracing::debug!(url = %self.url, bytes = body.len(), "Fetched subscription");

        Ok(decode_batch(&body)?)
    }
}
