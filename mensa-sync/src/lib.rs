//! mensa-sync library interface
//!
//! Exposes the pipeline and the operator API for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::db::DishStore;
use crate::models::RunReport;
use crate::services::SyncOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Local database (settings table, and dishes for the SQLite backend)
    pub db: SqlitePool,
    /// Dish store used by the pipeline
    pub store: Arc<dyn DishStore>,
    /// Pipeline owner; serializes runs
    pub orchestrator: Arc<SyncOrchestrator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, store: Arc<dyn DishStore>, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            db,
            store,
            orchestrator,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Update `last_error` from a finished run
    ///
    /// A run without feed or store errors clears the previous error.
    pub async fn record_run(&self, report: &RunReport) {
        *self.last_error.write().await = report.error_summary();
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::run_routes())
        .merge(api::dish_routes())
        .merge(api::settings_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
