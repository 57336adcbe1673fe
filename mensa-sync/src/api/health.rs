//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::settings::{get_last_run_at, LAST_SYNC_AT};
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok" or "degraded")
    pub status: String,
    /// Module name ("mensa-sync")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Whether the backfill stage has API keys
    pub backfill_enabled: bool,
    /// When the last sync run finished (persists across restarts)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Last error message if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
///
/// Reports "degraded" while the most recent run recorded an error.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();
    let last_sync_at = match get_last_run_at(&state.db, LAST_SYNC_AT).await {
        Ok(at) => at,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read last sync time");
            None
        }
    };

    let status = if last_error.is_some() { "degraded" } else { "ok" };

    Json(HealthResponse {
        status: status.to_string(),
        module: "mensa-sync".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        backfill_enabled: state.orchestrator.backfill_enabled(),
        last_sync_at,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
