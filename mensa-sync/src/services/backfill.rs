//! Metadata backfill
//!
//! Generates description, tags, nutrition estimates and an image for every
//! dish whose `meta_generiert` flag is false. A dish that fails keeps the
//! flag false and is picked up again by the next pass.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use mensa_common::db::{Dish, DishMetadata};
use std::sync::Arc;
use std::time::Duration;

use crate::db::DishStore;
use crate::models::generated_metadata::{filter_tags, parse_generated_metadata, ALLOWED_TAGS};
use crate::models::{BackfillReport, FailureKind, ItemOutcome, ItemReport};
use crate::services::image_client::ImageSearchClient;
use crate::services::text_client::{build_prompt, TextGenerationClient};

/// Minimum spacing between text-generation calls
pub const BACKFILL_INTERVAL_MS: u64 = 1200;

/// Backfill stage
pub struct Backfiller {
    store: Arc<dyn DishStore>,
    text_client: TextGenerationClient,
    image_client: ImageSearchClient,
    rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl Backfiller {
    pub fn new(
        store: Arc<dyn DishStore>,
        text_client: TextGenerationClient,
        image_client: ImageSearchClient,
    ) -> Self {
        Self::with_interval(
            store,
            text_client,
            image_client,
            Duration::from_millis(BACKFILL_INTERVAL_MS),
        )
    }

    /// Backfiller pacing text-generation calls by `interval` (zero disables pacing)
    pub fn with_interval(
        store: Arc<dyn DishStore>,
        text_client: TextGenerationClient,
        image_client: ImageSearchClient,
        interval: Duration,
    ) -> Self {
        let rate_limiter = Quota::with_period(interval).map(RateLimiter::direct);

        Self {
            store,
            text_client,
            image_client,
            rate_limiter,
        }
    }

    /// Process every pending dish, one at a time
    pub async fn run(&self) -> BackfillReport {
        let mut report = BackfillReport::default();

        let pending = match self.store.list_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list dishes pending metadata");
                report.store_error = Some(e.to_string());
                return report;
            }
        };

        report.pending = pending.len();
        tracing::info!(pending = pending.len(), "Starting metadata backfill");

        for dish in &pending {
            let outcome = self.process_dish(dish).await;
            report.push(ItemReport::new(Some(&dish.name), Some(&dish.date), outcome));
        }

        let counts = report.counts();
        tracing::info!(
            generated = counts.generated,
            skipped = counts.skipped,
            failed = counts.failed,
            "Metadata backfill finished"
        );

        report
    }

    /// Generate and store metadata for one dish
    pub async fn process_dish(&self, dish: &Dish) -> ItemOutcome {
        let name = dish.name.trim();
        if name.is_empty() || dish.ingredients.is_empty() {
            tracing::debug!(id = dish.id, "Skipping dish without name or ingredients");
            return ItemOutcome::skipped(FailureKind::Validation, "missing name or ingredients");
        }

        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let prompt = build_prompt(name, &dish.ingredients, &ALLOWED_TAGS);
        let content = match self.text_client.complete(&prompt).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(dish = %name, error = %e, "Text generation failed");
                return ItemOutcome::failed(e.kind(), e.to_string());
            }
        };

        let metadata = match self.assemble_metadata(name, &content).await {
            Ok(metadata) => metadata,
            Err(reason) => {
                tracing::warn!(dish = %name, error = %reason, "Generated metadata unusable");
                return ItemOutcome::failed(FailureKind::MalformedResponse, reason);
            }
        };

        match self.store.store_metadata(dish.id, &metadata).await {
            Ok(()) => {
                tracing::info!(dish = %name, tags = ?metadata.tags, "Stored generated metadata");
                ItemOutcome::Generated
            }
            Err(e) => {
                tracing::warn!(dish = %name, error = %e, "Storing metadata failed");
                ItemOutcome::failed(FailureKind::Persistence, e.to_string())
            }
        }
    }

    async fn assemble_metadata(&self, name: &str, content: &str) -> Result<DishMetadata, String> {
        let generated = parse_generated_metadata(content).map_err(|e| e.to_string())?;
        let description = generated.description().map_err(|e| e.to_string())?.to_string();
        let nutrition = generated.nutrition().map_err(|e| e.to_string())?;

        let image_url = self
            .image_client
            .image_url_or_placeholder(generated.image_query(name))
            .await;

        let display_name = generated
            .anzeigename
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(DishMetadata {
            display_name,
            description,
            tags: filter_tags(&generated.tags, &ALLOWED_TAGS),
            calories: nutrition.calories,
            fat: nutrition.fat,
            protein: nutrition.protein,
            carbohydrates: nutrition.carbohydrates,
            image_url,
            metadata_generated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDishStore;
    use crate::services::image_client::PLACEHOLDER_IMAGE_URL;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use mensa_common::db::NewDish;
    use serde_json::json;
    use sqlx::SqlitePool;

    async fn setup_store() -> SqliteDishStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        mensa_common::db::create_schema(&pool).await.unwrap();
        SqliteDishStore::new(pool)
    }

    fn backfiller(store: &SqliteDishStore, server: &MockServer) -> Backfiller {
        paced_backfiller(store, server, Duration::ZERO)
    }

    fn paced_backfiller(store: &SqliteDishStore, server: &MockServer, interval: Duration) -> Backfiller {
        Backfiller::with_interval(
            Arc::new(store.clone()),
            TextGenerationClient::new(server.url("/chat"), "sk", "m").unwrap(),
            ImageSearchClient::new(server.url("/search"), "img").unwrap(),
            interval,
        )
    }

    async fn insert_pending(store: &SqliteDishStore, name: &str, ingredients: &[&str]) {
        store
            .insert(&NewDish::new(
                name.into(),
                "2025-05-15".into(),
                None,
                None,
                ingredients.iter().map(|i| i.to_string()).collect(),
            ))
            .await
            .unwrap();
    }

    fn chat_reply(content: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"content": content}}]})
    }

    #[tokio::test]
    async fn test_dish_without_ingredients_skipped_without_calls() {
        let store = setup_store().await;
        store
            .insert(&NewDish::new("Tagessuppe".into(), "2025-05-15".into(), None, None, vec![]))
            .await
            .unwrap();

        let server = MockServer::start();
        let chat = server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).json_body(chat_reply("{}"));
        });

        let report = backfiller(&store, &server).run().await;

        assert_eq!(report.pending, 1);
        assert_eq!(report.counts().skipped, 1);
        chat.assert_hits(0);
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_text_calls_are_spaced_by_interval() {
        let store = setup_store().await;
        for name in ["Dal", "Curry", "Bowl"] {
            insert_pending(&store, name, &["linsen"]).await;
        }

        let server = MockServer::start();
        let chat = server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).json_body(chat_reply("{}"));
        });

        let started = tokio::time::Instant::now();
        let report = paced_backfiller(&store, &server, Duration::from_millis(150)).run().await;

        chat.assert_hits(3);
        assert_eq!(report.items.len(), 3);
        // First call goes out immediately, the other two wait one interval each
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_skipped_dishes_do_not_wait_for_limiter() {
        let store = setup_store().await;
        for name in ["Suppe", "Salat", "Brot"] {
            insert_pending(&store, name, &[]).await;
        }
        for name in ["Dal", "Curry"] {
            insert_pending(&store, name, &["linsen"]).await;
        }

        let server = MockServer::start();
        let chat = server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).json_body(chat_reply("{}"));
        });

        let started = tokio::time::Instant::now();
        let report = paced_backfiller(&store, &server, Duration::from_millis(300)).run().await;
        let elapsed = started.elapsed();

        chat.assert_hits(2);
        assert_eq!(report.counts().skipped, 3);
        // One wait between the two text calls; five waits if skips took a slot
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(900), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_missing_nutrition_keeps_flag() {
        let store = setup_store().await;
        store
            .insert(&NewDish::new(
                "Linsen-Dal".into(),
                "2025-05-15".into(),
                None,
                None,
                vec!["linsen".into()],
            ))
            .await
            .unwrap();

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(200)
                .json_body(chat_reply(r#"{"beschreibung": "Dal.", "naehrwerte_kcal": 400}"#));
        });

        let report = backfiller(&store, &server).run().await;

        assert!(matches!(
            report.items[0].outcome,
            ItemOutcome::Failed { kind: FailureKind::MalformedResponse, .. }
        ));
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_image_failure_falls_back_to_placeholder() {
        let store = setup_store().await;
        store
            .insert(&NewDish::new(
                "Linsen-Dal".into(),
                "2025-05-15".into(),
                None,
                None,
                vec!["linsen".into()],
            ))
            .await
            .unwrap();

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).json_body(chat_reply(
                r#"{"beschreibung": "Dal.", "tags": ["Vegan", "exotisch"], "naehrwerte_kcal": 400, "naehrwerte_fett": 9, "naehrwerte_protein": 21, "naehrwerte_kohlenhydrate": 55}"#,
            ));
        });
        let search = server.mock(|when, then| {
            when.method(GET).path("/search").query_param("query", "Linsen-Dal");
            then.status(500);
        });

        let report = backfiller(&store, &server).run().await;
        assert_eq!(report.counts().generated, 1);
        // No search phrase generated, so the dish name was used
        search.assert();

        let dish = store
            .find_by_name_and_date("Linsen-Dal", "2025-05-15")
            .await
            .unwrap()
            .unwrap();
        assert!(dish.metadata_generated);
        assert_eq!(dish.image_url.as_deref(), Some(PLACEHOLDER_IMAGE_URL));
        assert_eq!(dish.tags, vec!["vegan"]);
        assert!(dish.display_name.is_none());
    }

    #[tokio::test]
    async fn test_listing_failure_recorded() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteDishStore::new(pool);
        let server = MockServer::start();

        let report = backfiller(&store, &server).run().await;

        assert!(report.store_error.is_some());
        assert!(report.items.is_empty());
    }
}
