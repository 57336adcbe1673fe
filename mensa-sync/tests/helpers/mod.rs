//! Test Helper Utilities
//!
//! Shared setup for mensa-sync integration tests: an in-memory dish store
//! and an orchestrator wired to an `httpmock` server standing in for the
//! menu feed, the text-generation API and the image-search API.

#![allow(dead_code)]

use httpmock::Method::{GET, POST};
use httpmock::{Mock, MockServer};
use mensa_sync::db::SqliteDishStore;
use mensa_sync::services::{
    Backfiller, CategoryFilter, ImageSearchClient, MenuClient, SyncOrchestrator,
    TextGenerationClient,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

pub const FEED_PATH: &str = "/api/menu/today";
pub const CHAT_PATH: &str = "/v1/chat/completions";
pub const SEARCH_PATH: &str = "/v1/search";

/// In-memory database with the full schema
pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    mensa_common::db::create_schema(&pool)
        .await
        .expect("Failed to create schema");
    pool
}

/// Orchestrator over `pool` talking to `server`
///
/// Backfill is enabled and unpaced when `with_backfill` is set.
pub fn create_test_orchestrator(
    server: &MockServer,
    pool: &SqlitePool,
    with_backfill: bool,
) -> SyncOrchestrator {
    let store = Arc::new(SqliteDishStore::new(pool.clone()));

    let orchestrator = SyncOrchestrator::new(
        MenuClient::new(server.url(FEED_PATH)).unwrap(),
        CategoryFilter::new(["Menü vegan", "Menü vegetarisch"]),
        store.clone(),
    )
    .with_settings_db(pool.clone());

    if !with_backfill {
        return orchestrator;
    }

    orchestrator.with_backfiller(Backfiller::with_interval(
        store,
        TextGenerationClient::new(server.url(CHAT_PATH), "sk-test", "test-model").unwrap(),
        ImageSearchClient::new(server.url(SEARCH_PATH), "img-test").unwrap(),
        Duration::ZERO,
    ))
}

/// Feed entry as the menu feed delivers it
pub fn feed_item(name: &str, category: &str, notes: &[&str], date: &str, student: f64) -> Value {
    json!({
        "name": name,
        "category": category,
        "notes": notes,
        "date": date,
        "prices": {"student": student, "employee": student + 1.5}
    })
}

/// The "Chili sin Carne" entry used across scenarios
pub fn chili_feed_item() -> Value {
    feed_item("Chili sin Carne", "Menü vegan", &["bohnen", "mais"], "2025-05-15", 3.20)
}

/// Text-generation reply for "Chili sin Carne"
pub fn chili_generated_content() -> String {
    json!({
        "anzeigename": "Chili sin Carne",
        "beschreibung": "Herzhaftes veganes Chili.",
        "bild_suche": "vegan chili with beans",
        "tags": ["vegan", "scharf"],
        "naehrwerte_kcal": 450,
        "naehrwerte_fett": 12,
        "naehrwerte_protein": 18,
        "naehrwerte_kohlenhydrate": 60
    })
    .to_string()
}

/// Chat-completions response wrapping `content`
pub fn chat_reply(content: &str) -> Value {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

pub fn mock_feed<'a>(server: &'a MockServer, items: Value) -> Mock<'a> {
    server.mock(|when, then| {
        when.method(GET).path(FEED_PATH);
        then.status(200).json_body(items);
    })
}

pub fn mock_chat<'a>(server: &'a MockServer, content: &str) -> Mock<'a> {
    let body = chat_reply(content);
    server.mock(|when, then| {
        when.method(POST)
            .path(CHAT_PATH)
            .header("authorization", "Bearer sk-test");
        then.status(200).json_body(body);
    })
}

pub fn mock_image_search<'a>(server: &'a MockServer, large_url: &str) -> Mock<'a> {
    let body = json!({"photos": [{"src": {"large": large_url}}]});
    server.mock(|when, then| {
        when.method(GET)
            .path(SEARCH_PATH)
            .header("authorization", "img-test");
        then.status(200).json_body(body);
    })
}
