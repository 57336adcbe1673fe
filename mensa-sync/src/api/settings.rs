//! Settings API endpoints
//!
//! POST /api/settings/text_api_key and /api/settings/image_api_key store a
//! key in the database, the highest-priority configuration tier. Keys are
//! read at startup, so a new key takes effect on the next start.

use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::settings::{set_image_api_key, set_text_api_key, IMAGE_API_KEY, TEXT_API_KEY};

/// Request payload for setting an API key
#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    pub api_key: String,
}

/// Response payload for API key configuration
#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/settings/{key}
///
/// **Request:** `{"api_key": "..."}`
///
/// **Errors:**
/// - 400 Bad Request: empty or whitespace-only key
/// - 404 Not Found: unknown key name
/// - 500 Internal Server Error: database write failure
pub async fn set_api_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<SetApiKeyRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    if key != TEXT_API_KEY && key != IMAGE_API_KEY {
        return Err(ApiError::NotFound(format!("Unknown setting: {}", key)));
    }

    if !crate::config::is_valid_key(&payload.api_key) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }

    let api_key = payload.api_key.trim().to_string();
    let saved = if key == TEXT_API_KEY {
        set_text_api_key(&state.db, api_key).await
    } else {
        set_image_api_key(&state.db, api_key).await
    };
    saved?;

    info!(setting = %key, "API key configured via operator API");

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: format!("{} saved; restart mensa-sync to apply", key),
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings/:key", post(set_api_key))
}
