//! Settings database operations
//!
//! Key-value accessors over the `settings` table. API keys stored here take
//! priority over environment and TOML (see `crate::config`).

use chrono::{DateTime, Utc};
use mensa_common::{Error, Result};
use sqlx::{Pool, Sqlite};

#[cfg(test)]
use sqlx::SqlitePool;

/// Settings key of the text-generation bearer token
pub const TEXT_API_KEY: &str = "text_api_key";

/// Settings key of the image-search API key
pub const IMAGE_API_KEY: &str = "image_api_key";

/// Settings key of the hosted store API key
pub const REST_API_KEY: &str = "rest_api_key";

/// Settings key of the last completed sync run
pub const LAST_SYNC_AT: &str = "last_sync_at";

/// Settings key of the last completed backfill pass
pub const LAST_BACKFILL_AT: &str = "last_backfill_at";

/// Set text-generation API key in database
pub async fn set_text_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, TEXT_API_KEY, key).await
}

/// Set image-search API key in database
pub async fn set_image_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, IMAGE_API_KEY, key).await
}

/// Record when a run of the given kind finished
pub async fn set_last_run_at(db: &Pool<Sqlite>, key: &str, at: DateTime<Utc>) -> Result<()> {
    set_setting(db, key, at.to_rfc3339()).await
}

/// When a run of the given kind last finished
pub async fn get_last_run_at(db: &Pool<Sqlite>, key: &str) -> Result<Option<DateTime<Utc>>> {
    get_setting::<DateTime<Utc>>(db, key).await
}

/// Generic setting getter
///
/// A NULL value reads as unset.
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row.and_then(|(value,)| value) {
        Some(value) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        mensa_common::db::create_settings_table(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_get_text_api_key_not_exists() {
        let pool = setup_test_db().await;

        assert_eq!(get_setting::<String>(&pool, TEXT_API_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_image_api_key_update() {
        let pool = setup_test_db().await;

        set_image_api_key(&pool, "old_key".to_string()).await.unwrap();
        set_image_api_key(&pool, "new_key".to_string()).await.unwrap();

        assert_eq!(
            get_setting::<String>(&pool, IMAGE_API_KEY).await.unwrap(),
            Some("new_key".to_string())
        );

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = 'image_api_key'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1, "Should have exactly one entry after update");
    }

    #[tokio::test]
    async fn test_null_value_reads_as_unset() {
        let pool = setup_test_db().await;

        sqlx::query("INSERT INTO settings (key, value) VALUES ('text_api_key', NULL)")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(get_setting::<String>(&pool, TEXT_API_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_run_roundtrip() {
        let pool = setup_test_db().await;
        let at = DateTime::parse_from_rfc3339("2025-05-15T06:30:00Z")
            .unwrap()
            .with_timezone(&Utc);

        set_last_run_at(&pool, LAST_SYNC_AT, at).await.unwrap();

        assert_eq!(get_last_run_at(&pool, LAST_SYNC_AT).await.unwrap(), Some(at));
        assert_eq!(get_last_run_at(&pool, LAST_BACKFILL_AT).await.unwrap(), None);
    }
}
