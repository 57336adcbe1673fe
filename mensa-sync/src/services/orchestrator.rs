//! Sync orchestration
//!
//! fetch → category filter → upsert → backfill (when something changed).
//!
//! Only one run executes at a time per process. A trigger arriving while a
//! run is active is rejected rather than queued. A started run always
//! completes; there is no cancellation.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::db::settings::{set_last_run_at, LAST_BACKFILL_AT, LAST_SYNC_AT};
use crate::db::DishStore;
use crate::models::{BackfillReport, RunReport, RunTrigger, SyncReport};
use crate::services::backfill::Backfiller;
use crate::services::category_filter::CategoryFilter;
use crate::services::menu_client::MenuClient;
use crate::services::upsert::UpsertEngine;

/// Orchestrator errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("A sync run is already in progress")]
    AlreadyRunning,
}

/// Owns the pipeline stages and serializes runs
pub struct SyncOrchestrator {
    menu_client: MenuClient,
    filter: CategoryFilter,
    upsert: UpsertEngine,
    backfiller: Option<Backfiller>,
    settings_db: Option<SqlitePool>,
    run_lock: Mutex<()>,
    last_run: RwLock<Option<RunReport>>,
}

impl SyncOrchestrator {
    pub fn new(menu_client: MenuClient, filter: CategoryFilter, store: Arc<dyn DishStore>) -> Self {
        Self {
            menu_client,
            filter,
            upsert: UpsertEngine::new(store),
            backfiller: None,
            settings_db: None,
            run_lock: Mutex::new(()),
            last_run: RwLock::new(None),
        }
    }

    /// Enable the backfill stage
    pub fn with_backfiller(mut self, backfiller: Backfiller) -> Self {
        self.backfiller = Some(backfiller);
        self
    }

    /// Record completion times in the settings table
    pub fn with_settings_db(mut self, pool: SqlitePool) -> Self {
        self.settings_db = Some(pool);
        self
    }

    pub fn backfill_enabled(&self) -> bool {
        self.backfiller.is_some()
    }

    /// Report of the most recent completed run
    pub async fn last_run(&self) -> Option<RunReport> {
        self.last_run.read().await.clone()
    }

    /// Sync the feed; backfill if any dish was inserted or updated
    pub async fn run_sync(&self) -> Result<RunReport, OrchestratorError> {
        let _guard = self.run_lock.try_lock().map_err(|_| OrchestratorError::AlreadyRunning)?;
        Ok(self.execute(RunTrigger::Sync, true, false).await)
    }

    /// Backfill pending dishes without touching the feed
    pub async fn run_backfill(&self) -> Result<RunReport, OrchestratorError> {
        let _guard = self.run_lock.try_lock().map_err(|_| OrchestratorError::AlreadyRunning)?;
        Ok(self.execute(RunTrigger::Backfill, false, true).await)
    }

    /// What the service does on start
    ///
    /// Syncs the feed, then backfills exactly once: after the sync when it
    /// changed something, otherwise as a separate pass so dishes left pending
    /// by an earlier run are retried.
    pub async fn run_startup(&self) -> Result<RunReport, OrchestratorError> {
        let _guard = self.run_lock.try_lock().map_err(|_| OrchestratorError::AlreadyRunning)?;
        Ok(self.execute(RunTrigger::Startup, true, true).await)
    }

    async fn execute(&self, trigger: RunTrigger, sync: bool, always_backfill: bool) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(%run_id, ?trigger, "Run started");

        let sync_report = if sync {
            Some(self.sync_stage().await)
        } else {
            None
        };

        let changed = sync_report.as_ref().is_some_and(SyncReport::changed);
        let backfill_report = if changed || always_backfill {
            self.backfill_stage().await
        } else {
            None
        };

        let finished_at = Utc::now();
        let report = RunReport {
            run_id,
            trigger,
            started_at,
            finished_at,
            sync: sync_report,
            backfill: backfill_report,
        };

        self.record_completion(&report).await;
        *self.last_run.write().await = Some(report.clone());

        tracing::info!(
            %run_id,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Run finished"
        );
        report
    }

    async fn sync_stage(&self) -> SyncReport {
        let items = match self.menu_client.try_fetch_items().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(url = %self.menu_client.feed_url(), error = %e, "Menu feed unavailable");
                return SyncReport {
                    feed_error: Some(e.to_string()),
                    items: Vec::new(),
                };
            }
        };

        let kept = self.filter.retain(items);
        self.upsert.run(&kept).await
    }

    async fn backfill_stage(&self) -> Option<BackfillReport> {
        match &self.backfiller {
            Some(backfiller) => Some(backfiller.run().await),
            None => {
                tracing::debug!("Backfill disabled, API keys not configured");
                None
            }
        }
    }

    async fn record_completion(&self, report: &RunReport) {
        let Some(pool) = &self.settings_db else {
            return;
        };

        let mut markers = Vec::new();
        if report.sync.is_some() {
            markers.push(LAST_SYNC_AT);
        }
        if report.backfill.is_some() {
            markers.push(LAST_BACKFILL_AT);
        }

        for key in markers {
            if let Err(e) = set_last_run_at(pool, key, report.finished_at).await {
                tracing::warn!(key, error = %e, "Could not record run completion");
            }
        }
    }
}
