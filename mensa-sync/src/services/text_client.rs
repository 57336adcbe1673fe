//! Text-generation API client
//!
//! Chat-completions wire format: POST `{model, messages, temperature}` with a
//! bearer token, answer in `choices[0].message.content`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::FailureKind;
use crate::services::USER_AGENT;

const DEFAULT_TEMPERATURE: f32 = 0.7;

const SYSTEM_PROMPT: &str =
    "Du bist ein Ernährungsexperte für eine Uni-Mensa. Antworte ausschließlich mit JSON.";

/// Text-generation client errors
#[derive(Debug, Error)]
pub enum TextGenError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Response contained no content")]
    EmptyResponse,
}

impl TextGenError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NetworkError(_) | Self::ApiError(..) => FailureKind::Network,
            Self::ParseError(_) | Self::EmptyResponse => FailureKind::MalformedResponse,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Text-generation API client
pub struct TextGenerationClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl TextGenerationClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, TextGenError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TextGenError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Send one prompt and return the raw content of the first choice
    pub async fn complete(&self, prompt: &str) -> Result<String, TextGenError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
        };

        tracing::debug!(model = %self.model, "Requesting text generation");

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TextGenError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TextGenError::ApiError(status.as_u16(), error_text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| TextGenError::ParseError(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(TextGenError::EmptyResponse)
    }
}

/// Prompt asking for the metadata JSON of one dish
pub fn build_prompt(name: &str, ingredients: &[String], allowed_tags: &[&str]) -> String {
    format!(
        "Gericht: \"{name}\"\n\
         Zutaten: {ingredients}\n\n\
         Erstelle ein JSON-Objekt mit genau diesen Feldern:\n\
         - \"anzeigename\": ein appetitlicher, kurzer Anzeigename\n\
         - \"beschreibung\": eine kurze Beschreibung (maximal zwei Sätze)\n\
         - \"bild_suche\": eine englische Suchphrase für ein passendes Foto\n\
         - \"tags\": eine Liste von Tags, ausschließlich aus: {tags}\n\
         - \"naehrwerte_kcal\": geschätzte Kilokalorien pro Portion (Zahl)\n\
         - \"naehrwerte_fett\": geschätztes Fett in Gramm (Zahl)\n\
         - \"naehrwerte_protein\": geschätztes Protein in Gramm (Zahl)\n\
         - \"naehrwerte_kohlenhydrate\": geschätzte Kohlenhydrate in Gramm (Zahl)\n\
         Antworte nur mit dem JSON-Objekt.",
        name = name,
        ingredients = ingredients.join(", "),
        tags = allowed_tags.join(", "),
    )
}
