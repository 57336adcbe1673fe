//! Run trigger endpoints
//!
//! POST /sync, POST /backfill, GET /runs/last
//!
//! Triggers run to completion before responding. A trigger arriving while
//! another run is active gets 409.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::models::RunReport;
use crate::AppState;

/// POST /sync
pub async fn trigger_sync(State(state): State<AppState>) -> ApiResult<Json<RunReport>> {
    let report = state.orchestrator.run_sync().await?;
    state.record_run(&report).await;
    Ok(Json(report))
}

/// POST /backfill
///
/// 503 when the text or image API key is missing.
pub async fn trigger_backfill(State(state): State<AppState>) -> ApiResult<Json<RunReport>> {
    if !state.orchestrator.backfill_enabled() {
        return Err(ApiError::Unavailable(
            "Metadata backfill disabled: text and image API keys required".to_string(),
        ));
    }

    let report = state.orchestrator.run_backfill().await?;
    state.record_run(&report).await;
    Ok(Json(report))
}

/// GET /runs/last
pub async fn last_run(State(state): State<AppState>) -> ApiResult<Json<RunReport>> {
    state
        .orchestrator
        .last_run()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No run has completed yet".to_string()))
}

/// Build run trigger routes
pub fn run_routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(trigger_sync))
        .route("/backfill", post(trigger_backfill))
        .route("/runs/last", get(last_run))
}
