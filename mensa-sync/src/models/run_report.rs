//! Run results and per-item outcomes
//!
//! A run never aborts because one dish failed. Each dish gets an outcome and
//! the outcomes are collected into a report that is logged and kept for the
//! operator API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a unit of work did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Transport failure or non-success HTTP status
    Network,
    /// External response could not be parsed
    MalformedResponse,
    /// Store read or write failed
    Persistence,
    /// Required field missing
    Validation,
}

/// Result of processing one dish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// New record written
    Inserted,
    /// Sync fields changed, generated flag reset
    Updated,
    /// Record matched the feed, nothing written
    Unchanged,
    /// Metadata written, generated flag set
    Generated,
    /// Not processed, not an error of an external system
    Skipped { kind: FailureKind, reason: String },
    /// Processing failed, will be retried on a later run
    Failed { kind: FailureKind, reason: String },
}

impl ItemOutcome {
    pub fn skipped(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Skipped {
            kind,
            reason: reason.into(),
        }
    }

    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            reason: reason.into(),
        }
    }

    /// True for outcomes that wrote to the store
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Inserted | Self::Updated | Self::Generated)
    }
}

/// Outcome for one dish, identified by its natural key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReport {
    pub name: Option<String>,
    pub date: Option<String>,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl ItemReport {
    pub fn new(name: Option<&str>, date: Option<&str>, outcome: ItemOutcome) -> Self {
        Self {
            name: name.map(str::to_string),
            date: date.map(str::to_string),
            outcome,
        }
    }
}

/// Per-item outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

fn count_outcomes(items: &[ItemReport]) -> OutcomeCounts {
    let mut counts = OutcomeCounts::default();
    for item in items {
        match item.outcome {
            ItemOutcome::Inserted => counts.inserted += 1,
            ItemOutcome::Updated => counts.updated += 1,
            ItemOutcome::Unchanged => counts.unchanged += 1,
            ItemOutcome::Generated => counts.generated += 1,
            ItemOutcome::Skipped { .. } => counts.skipped += 1,
            ItemOutcome::Failed { .. } => counts.failed += 1,
        }
    }
    counts
}

/// Result of the upsert stage for one feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Set when the feed could not be fetched (the run then saw no items)
    pub feed_error: Option<String>,
    pub items: Vec<ItemReport>,
}

impl SyncReport {
    pub fn push(&mut self, item: ItemReport) {
        self.items.push(item);
    }

    /// True if any record was inserted or updated
    pub fn changed(&self) -> bool {
        self.items.iter().any(|i| i.outcome.is_write())
    }

    pub fn counts(&self) -> OutcomeCounts {
        count_outcomes(&self.items)
    }
}

/// Result of one backfill pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Set when the pending rows could not be listed
    pub store_error: Option<String>,
    /// Rows that had `meta_generiert = false` when the pass started
    pub pending: usize,
    pub items: Vec<ItemReport>,
}

impl BackfillReport {
    pub fn push(&mut self, item: ItemReport) {
        self.items.push(item);
    }

    pub fn counts(&self) -> OutcomeCounts {
        count_outcomes(&self.items)
    }
}

/// A complete orchestrated run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub trigger: RunTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Absent for backfill-only runs
    pub sync: Option<SyncReport>,
    /// Absent when sync made no change and no backfill was requested,
    /// or when backfill is disabled
    pub backfill: Option<BackfillReport>,
}

impl RunReport {
    /// Run-level errors and store write failures, joined for display
    ///
    /// Network and parse failures of single dishes are retried on the next
    /// run and are not included.
    pub fn error_summary(&self) -> Option<String> {
        let store_failures = self
            .sync
            .iter()
            .flat_map(|s| &s.items)
            .chain(self.backfill.iter().flat_map(|b| &b.items))
            .filter(|item| {
                matches!(
                    item.outcome,
                    ItemOutcome::Failed {
                        kind: FailureKind::Persistence,
                        ..
                    }
                )
            })
            .count();

        let errors: Vec<String> = [
            self.sync.as_ref().and_then(|s| s.feed_error.as_ref()).map(|e| format!("menu feed: {}", e)),
            self.backfill.as_ref().and_then(|b| b.store_error.as_ref()).map(|e| format!("backfill: {}", e)),
            (store_failures > 0).then(|| format!("store: {} items failed", store_failures)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        }
    }
}

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Startup,
    Sync,
    Backfill,
}
