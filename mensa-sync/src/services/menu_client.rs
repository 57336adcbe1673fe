//! Menu feed client
//!
//! Fetches today's dishes from the external feed. The feed is unauthenticated
//! and not retried; a failed fetch means "no dishes this run".

use std::time::Duration;
use thiserror::Error;

use crate::models::{FailureKind, MenuItem};
use crate::services::USER_AGENT;

/// Menu feed errors
#[derive(Debug, Error)]
pub enum MenuFeedError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Feed error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl MenuFeedError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NetworkError(_) | Self::ApiError(..) => FailureKind::Network,
            Self::ParseError(_) => FailureKind::MalformedResponse,
        }
    }
}

/// Menu feed client
pub struct MenuClient {
    http_client: reqwest::Client,
    feed_url: String,
}

impl MenuClient {
    pub fn new(feed_url: impl Into<String>) -> Result<Self, MenuFeedError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MenuFeedError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            feed_url: feed_url.into(),
        })
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Fetch the feed, surfacing the failure kind
    pub async fn try_fetch_items(&self) -> Result<Vec<MenuItem>, MenuFeedError> {
        tracing::debug!(url = %self.feed_url, "Fetching menu feed");

        let response = self
            .http_client
            .get(&self.feed_url)
            .send()
            .await
            .map_err(|e| MenuFeedError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MenuFeedError::ApiError(status.as_u16(), error_text));
        }

        let items: Vec<MenuItem> = response
            .json()
            .await
            .map_err(|e| MenuFeedError::ParseError(e.to_string()))?;

        tracing::info!(count = items.len(), "Fetched menu feed");
        Ok(items)
    }

    /// Fetch the feed; any failure is logged and yields no items
    ///
    /// Convenience entry point for callers that treat an unreachable feed
    /// like an empty menu. The orchestrator uses [`Self::try_fetch_items`]
    /// so the failure lands in the run report.
    pub async fn fetch_items(&self) -> Vec<MenuItem> {
        match self.try_fetch_items().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(url = %self.feed_url, error = %e, "Menu feed unavailable");
                Vec::new()
            }
        }
    }
}
