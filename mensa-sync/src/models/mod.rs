//! Data models for mensa-sync
//!
//! - Feed entries as delivered by the menu feed
//! - Metadata produced by the text-generation service
//! - Per-item outcomes and run reports

pub mod generated_metadata;
pub mod menu_item;
pub mod run_report;

pub use generated_metadata::{GeneratedMetadata, ParseMetadataError};
pub use menu_item::{MenuItem, Prices};
pub use run_report::{
    BackfillReport, FailureKind, ItemOutcome, ItemReport, OutcomeCounts, RunReport, RunTrigger,
    SyncReport,
};
