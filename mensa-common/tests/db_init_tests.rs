//! Tests for database initialization
//!
//! Covers automatic database creation, reopening an existing file, and the
//! natural-key constraint on the dish table.

use mensa_common::db::init::init_database;
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("mensa.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("mensa.db");

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    // Schema creation is idempotent
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_tables_created() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("mensa.db")).await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(tables, vec!["gerichte".to_string(), "settings".to_string()]);
}

#[tokio::test]
async fn test_name_and_date_are_unique() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("mensa.db")).await.unwrap();

    let insert = "INSERT INTO gerichte (name, datum, erstellt_am) VALUES (?, ?, '2025-05-15T06:00:00Z')";

    sqlx::query(insert)
        .bind("Chili sin Carne")
        .bind("2025-05-15")
        .execute(&pool)
        .await
        .unwrap();

    // Same dish on another day is a separate record
    sqlx::query(insert)
        .bind("Chili sin Carne")
        .bind("2025-05-16")
        .execute(&pool)
        .await
        .unwrap();

    let duplicate = sqlx::query(insert)
        .bind("Chili sin Carne")
        .bind("2025-05-15")
        .execute(&pool)
        .await;
    assert!(duplicate.is_err(), "Duplicate (name, datum) must be rejected");
}
