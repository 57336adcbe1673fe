//! Upsert engine
//!
//! Writes filtered feed items into the dish table, keyed by `(name, date)`.
//! The lookup-then-write is not transactional; the SQLite backend's unique
//! constraint turns a lost race into a per-item persistence failure.

use mensa_common::db::{Dish, DishChanges, NewDish};
use std::sync::Arc;

use crate::db::DishStore;
use crate::models::{FailureKind, ItemOutcome, ItemReport, MenuItem, SyncReport};

/// Prices closer than this are the same price
const PRICE_EPSILON: f64 = 0.005;

/// Upsert engine over a dish store
pub struct UpsertEngine {
    store: Arc<dyn DishStore>,
}

impl UpsertEngine {
    pub fn new(store: Arc<dyn DishStore>) -> Self {
        Self { store }
    }

    /// Upsert every item, one at a time
    pub async fn run(&self, items: &[MenuItem]) -> SyncReport {
        let mut report = SyncReport::default();

        for item in items {
            let outcome = self.upsert_item(item).await;
            report.push(ItemReport::new(item.trimmed_name(), item.trimmed_date(), outcome));
        }

        let counts = report.counts();
        tracing::info!(
            inserted = counts.inserted,
            updated = counts.updated,
            unchanged = counts.unchanged,
            skipped = counts.skipped,
            failed = counts.failed,
            "Upsert pass finished"
        );

        report
    }

    /// Upsert one item; errors become the returned outcome
    pub async fn upsert_item(&self, item: &MenuItem) -> ItemOutcome {
        let (name, date) = match (item.trimmed_name(), item.trimmed_date()) {
            (Some(name), Some(date)) => (name, date),
            _ => {
                tracing::debug!(name = ?item.name, date = ?item.date, "Skipping item without name or date");
                return ItemOutcome::skipped(FailureKind::Validation, "missing name or date");
            }
        };

        let existing = match self.store.find_by_name_and_date(name, date).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(dish = %name, date = %date, error = %e, "Lookup failed");
                return ItemOutcome::failed(FailureKind::Persistence, e.to_string());
            }
        };

        let category = item.category.as_deref().map(str::trim).map(str::to_string);
        let price = item.prices.student;
        let ingredients = item.notes.clone();

        match existing {
            None => {
                let new_dish = NewDish::new(
                    name.to_string(),
                    date.to_string(),
                    category,
                    price,
                    ingredients,
                );
                match self.store.insert(&new_dish).await {
                    Ok(dish) => {
                        tracing::info!(dish = %name, date = %date, id = dish.id, "Inserted dish");
                        ItemOutcome::Inserted
                    }
                    Err(e) => {
                        tracing::warn!(dish = %name, date = %date, error = %e, "Insert failed");
                        ItemOutcome::failed(FailureKind::Persistence, e.to_string())
                    }
                }
            }
            Some(dish) => {
                let changes = DishChanges::new(category, price, ingredients);
                if !sync_fields_differ(&dish, &changes) {
                    return ItemOutcome::Unchanged;
                }

                match self.store.update_sync_fields(dish.id, &changes).await {
                    Ok(()) => {
                        tracing::info!(dish = %name, date = %date, id = dish.id, "Updated dish, metadata will be regenerated");
                        ItemOutcome::Updated
                    }
                    Err(e) => {
                        tracing::warn!(dish = %name, date = %date, error = %e, "Update failed");
                        ItemOutcome::failed(FailureKind::Persistence, e.to_string())
                    }
                }
            }
        }
    }
}

/// True if the feed reports different ingredients, category or price
pub fn sync_fields_differ(dish: &Dish, changes: &DishChanges) -> bool {
    dish.ingredients != changes.ingredients
        || dish.category != changes.category
        || !same_price(dish.price, changes.price)
}

fn same_price(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => (a - b).abs() < PRICE_EPSILON,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDishStore;
    use crate::models::Prices;
    use sqlx::SqlitePool;

    async fn setup_engine() -> (UpsertEngine, SqliteDishStore) {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        mensa_common::db::create_schema(&pool).await.unwrap();
        let store = SqliteDishStore::new(pool);
        (UpsertEngine::new(Arc::new(store.clone())), store)
    }

    fn chili(notes: &[&str], price: f64) -> MenuItem {
        MenuItem {
            name: Some("Chili sin Carne".to_string()),
            category: Some("Menü vegan".to_string()),
            notes: notes.iter().map(|n| n.to_string()).collect(),
            date: Some("2025-05-15".to_string()),
            prices: Prices {
                student: Some(price),
                ..Prices::default()
            },
        }
    }

    #[tokio::test]
    async fn test_insert_then_unchanged() {
        let (engine, store) = setup_engine().await;

        let first = engine.run(&[chili(&["bohnen", "mais"], 3.2)]).await;
        assert_eq!(first.items[0].outcome, ItemOutcome::Inserted);
        assert!(first.changed());

        let second = engine.run(&[chili(&["bohnen", "mais"], 3.2)]).await;
        assert_eq!(second.items[0].outcome, ItemOutcome::Unchanged);
        assert!(!second.changed());

        assert_eq!(store.list_by_date("2025-05-15").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ingredient_order_is_a_change() {
        let (engine, _store) = setup_engine().await;
        engine.run(&[chili(&["bohnen", "mais"], 3.2)]).await;

        let report = engine.run(&[chili(&["mais", "bohnen"], 3.2)]).await;
        assert_eq!(report.items[0].outcome, ItemOutcome::Updated);
    }

    #[tokio::test]
    async fn test_price_rounding_is_not_a_change() {
        let (engine, _store) = setup_engine().await;
        engine.run(&[chili(&["bohnen"], 3.2)]).await;

        let report = engine.run(&[chili(&["bohnen"], 3.2000001)]).await;
        assert_eq!(report.items[0].outcome, ItemOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_missing_key_fields_skipped() {
        let (engine, store) = setup_engine().await;

        let mut no_name = chili(&["bohnen"], 3.2);
        no_name.name = None;
        let mut blank_date = chili(&["bohnen"], 3.2);
        blank_date.date = Some("   ".to_string());

        let report = engine.run(&[no_name, blank_date]).await;

        assert!(report
            .items
            .iter()
            .all(|i| matches!(i.outcome, ItemOutcome::Skipped { kind: FailureKind::Validation, .. })));
        assert!(store.list_by_date("2025-05-15").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_per_item() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        // No schema: every query fails
        let engine = UpsertEngine::new(Arc::new(SqliteDishStore::new(pool)));

        let report = engine.run(&[chili(&["bohnen"], 3.2), chili(&["mais"], 2.0)]).await;

        assert_eq!(report.items.len(), 2);
        assert_eq!(report.counts().failed, 2);
        assert!(!report.changed());
    }

    #[test]
    fn test_same_price() {
        assert!(same_price(None, None));
        assert!(same_price(Some(3.2), Some(3.2)));
        assert!(!same_price(Some(3.2), Some(3.3)));
        assert!(!same_price(Some(3.2), None));
    }
}
