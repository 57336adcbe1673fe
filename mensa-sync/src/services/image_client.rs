//! Image-search API client
//!
//! GET `?query=..&per_page=1` with the API key in the `Authorization` header;
//! answer `{photos: [{src: {large}}]}`.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::services::USER_AGENT;

/// Image used when the search finds nothing or fails
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/800x600?text=Mensa";

/// Image-search client errors
#[derive(Debug, Error)]
pub enum ImageSearchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    #[serde(default)]
    src: PhotoSources,
}

#[derive(Debug, Default, Deserialize)]
struct PhotoSources {
    #[serde(default)]
    large: Option<String>,
}

/// Image-search API client
pub struct ImageSearchClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ImageSearchClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ImageSearchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ImageSearchError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: api_url.into(),
            api_key: api_key.into(),
        })
    }

    /// First result with a non-empty large image URL
    pub async fn search_large_image(&self, query: &str) -> Result<Option<String>, ImageSearchError> {
        tracing::debug!(query = %query, "Searching image");

        let response = self
            .http_client
            .get(&self.api_url)
            .header("Authorization", &self.api_key)
            .query(&[("query", query), ("per_page", "1")])
            .send()
            .await
            .map_err(|e| ImageSearchError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ImageSearchError::ApiError(status.as_u16(), error_text));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ImageSearchError::ParseError(e.to_string()))?;

        Ok(body
            .photos
            .into_iter()
            .filter_map(|photo| photo.src.large)
            .find(|url| !url.trim().is_empty()))
    }

    /// Image URL for `query`, the placeholder on any failure
    pub async fn image_url_or_placeholder(&self, query: &str) -> String {
        match self.search_large_image(query).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                tracing::debug!(query = %query, "No image found, using placeholder");
                PLACEHOLDER_IMAGE_URL.to_string()
            }
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Image search failed, using placeholder");
                PLACEHOLDER_IMAGE_URL.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_first_large_image() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/search")
                .query_param("query", "vegan chili with beans")
                .header("authorization", "img-key");
            then.status(200).json_body(json!({
                "photos": [
                    {"src": {"large": ""}},
                    {"src": {"large": "https://images.example/chili.jpg"}}
                ]
            }));
        });

        let client = ImageSearchClient::new(server.url("/v1/search"), "img-key").unwrap();
        let url = client.image_url_or_placeholder("vegan chili with beans").await;

        mock.assert();
        assert_eq!(url, "https://images.example/chili.jpg");
    }

    #[tokio::test]
    async fn test_no_photos_uses_placeholder() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/search");
            then.status(200).json_body(json!({"photos": []}));
        });

        let client = ImageSearchClient::new(server.url("/v1/search"), "k").unwrap();
        assert_eq!(client.image_url_or_placeholder("x").await, PLACEHOLDER_IMAGE_URL);
    }

    #[tokio::test]
    async fn test_error_uses_placeholder() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/search");
            then.status(403).body("forbidden");
        });

        let client = ImageSearchClient::new(server.url("/v1/search"), "k").unwrap();

        assert!(matches!(
            client.search_large_image("x").await,
            Err(ImageSearchError::ApiError(403, _))
        ));
        assert_eq!(client.image_url_or_placeholder("x").await, PLACEHOLDER_IMAGE_URL);
    }
}
