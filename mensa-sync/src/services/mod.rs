//! Pipeline stages and the external service clients they use

pub mod backfill;
pub mod category_filter;
pub mod image_client;
pub mod menu_client;
pub mod orchestrator;
pub mod text_client;
pub mod upsert;

pub use backfill::{Backfiller, BACKFILL_INTERVAL_MS};
pub use category_filter::CategoryFilter;
pub use image_client::{ImageSearchClient, ImageSearchError, PLACEHOLDER_IMAGE_URL};
pub use menu_client::{MenuClient, MenuFeedError};
pub use orchestrator::{OrchestratorError, SyncOrchestrator};
pub use text_client::{TextGenError, TextGenerationClient};
pub use upsert::UpsertEngine;

/// User agent sent to every external service
pub(crate) const USER_AGENT: &str = concat!("mensa-sync/", env!("CARGO_PKG_VERSION"));
