//! Database initialization
//!
//! Opens (or creates) the local SQLite database and creates the tables the
//! services need. Every statement is idempotent, so this runs on each start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // The pipeline is sequential, a small pool is plenty
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the operator API read while a run writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table used by the services
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_dishes_table(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores key-value pairs (API keys, last run markers).
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the dish table
///
/// `(name, datum)` is the natural key. `zutaten` and `tags` hold JSON arrays.
pub async fn create_dishes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gerichte (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            anzeigename TEXT,
            beschreibung TEXT,
            kategorie TEXT,
            preis REAL,
            zutaten TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            naehrwerte_kcal REAL,
            naehrwerte_fett REAL,
            naehrwerte_protein REAL,
            naehrwerte_kohlenhydrate REAL,
            bild_url TEXT,
            meta_generiert INTEGER NOT NULL DEFAULT 0 CHECK (meta_generiert IN (0, 1)),
            datum TEXT NOT NULL,
            erstellt_am TEXT NOT NULL,
            UNIQUE (name, datum)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_gerichte_meta_generiert ON gerichte(meta_generiert)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
