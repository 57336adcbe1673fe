//! Dish persistence
//!
//! The pipeline talks to the dish table through [`DishStore`]. Two backends:
//! - [`sqlite::SqliteDishStore`]: local database in the root folder
//! - [`rest::RestDishStore`]: hosted PostgREST-compatible table
//!
//! The `settings` table always lives in the local SQLite database.

pub mod rest;
pub mod settings;
pub mod sqlite;

use async_trait::async_trait;
use mensa_common::db::{Dish, DishChanges, DishMetadata, NewDish};
use thiserror::Error;

pub use rest::RestDishStore;
pub use sqlite::SqliteDishStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Store returned {0}: {1}")]
    Status(u16, String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Dish {0} not found")]
    NotFound(i64),
}

/// Access to the dish table
///
/// Lookups have maybe-single semantics: zero matching rows is `Ok(None)`,
/// not an error.
#[async_trait]
pub trait DishStore: Send + Sync {
    /// Look up a dish by its natural key
    async fn find_by_name_and_date(&self, name: &str, date: &str) -> Result<Option<Dish>, StoreError>;

    /// Insert a new dish and return the stored row
    async fn insert(&self, dish: &NewDish) -> Result<Dish, StoreError>;

    /// Overwrite the sync-owned fields and reset `meta_generiert`
    async fn update_sync_fields(&self, id: i64, changes: &DishChanges) -> Result<(), StoreError>;

    /// All dishes with `meta_generiert = false`, oldest first
    async fn list_pending(&self) -> Result<Vec<Dish>, StoreError>;

    /// Write the backfill-owned fields and set `meta_generiert`
    async fn store_metadata(&self, id: i64, metadata: &DishMetadata) -> Result<(), StoreError>;

    /// All dishes served on `date`
    async fn list_by_date(&self, date: &str) -> Result<Vec<Dish>, StoreError>;
}
