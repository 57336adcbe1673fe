//! SQLite dish store
//!
//! `zutaten` and `tags` are stored as JSON text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mensa_common::db::{Dish, DishChanges, DishMetadata, NewDish};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{DishStore, StoreError};

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, anzeigename, beschreibung, kategorie, preis, zutaten, tags,
           naehrwerte_kcal, naehrwerte_fett, naehrwerte_protein, naehrwerte_kohlenhydrate,
           bild_url, meta_generiert, datum, erstellt_am
    FROM gerichte
"#;

/// Dish store backed by the local SQLite pool
#[derive(Clone)]
pub struct SqliteDishStore {
    pool: SqlitePool,
}

impl SqliteDishStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load(&self, id: i64) -> Result<Dish, StoreError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        dish_from_row(&row)
    }
}

fn encode_list(values: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(values).map_err(|e| StoreError::Decode(e.to_string()))
}

fn decode_list(raw: Option<String>) -> Result<Vec<String>, StoreError> {
    match raw {
        Some(text) if !text.trim().is_empty() => {
            serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))
        }
        _ => Ok(Vec::new()),
    }
}

fn dish_from_row(row: &SqliteRow) -> Result<Dish, StoreError> {
    let created_at: DateTime<Utc> = row.try_get("erstellt_am")?;

    Ok(Dish {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        display_name: row.try_get("anzeigename")?,
        description: row.try_get("beschreibung")?,
        category: row.try_get("kategorie")?,
        price: row.try_get("preis")?,
        ingredients: decode_list(row.try_get("zutaten")?)?,
        tags: decode_list(row.try_get("tags")?)?,
        calories: row.try_get("naehrwerte_kcal")?,
        fat: row.try_get("naehrwerte_fett")?,
        protein: row.try_get("naehrwerte_protein")?,
        carbohydrates: row.try_get("naehrwerte_kohlenhydrate")?,
        image_url: row.try_get("bild_url")?,
        metadata_generated: row.try_get("meta_generiert")?,
        date: row.try_get("datum")?,
        created_at,
    })
}

#[async_trait]
impl DishStore for SqliteDishStore {
    async fn find_by_name_and_date(&self, name: &str, date: &str) -> Result<Option<Dish>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE name = ? AND datum = ? LIMIT 1", SELECT_COLUMNS))
            .bind(name)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(dish_from_row).transpose()
    }

    async fn insert(&self, dish: &NewDish) -> Result<Dish, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO gerichte (name, datum, kategorie, preis, zutaten, meta_generiert, erstellt_am)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&dish.name)
        .bind(&dish.date)
        .bind(&dish.category)
        .bind(dish.price)
        .bind(encode_list(&dish.ingredients)?)
        .bind(dish.metadata_generated)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.load(result.last_insert_rowid()).await
    }

    async fn update_sync_fields(&self, id: i64, changes: &DishChanges) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE gerichte
            SET kategorie = ?, preis = ?, zutaten = ?, meta_generiert = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.category)
        .bind(changes.price)
        .bind(encode_list(&changes.ingredients)?)
        .bind(changes.metadata_generated)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<Dish>, StoreError> {
        let rows = sqlx::query(&format!("{} WHERE meta_generiert = 0 ORDER BY id", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(dish_from_row).collect()
    }

    async fn store_metadata(&self, id: i64, metadata: &DishMetadata) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE gerichte
            SET anzeigename = ?, beschreibung = ?, tags = ?,
                naehrwerte_kcal = ?, naehrwerte_fett = ?, naehrwerte_protein = ?,
                naehrwerte_kohlenhydrate = ?, bild_url = ?, meta_generiert = ?
            WHERE id = ?
            "#,
        )
        .bind(&metadata.display_name)
        .bind(&metadata.description)
        .bind(encode_list(&metadata.tags)?)
        .bind(metadata.calories)
        .bind(metadata.fat)
        .bind(metadata.protein)
        .bind(metadata.carbohydrates)
        .bind(&metadata.image_url)
        .bind(metadata.metadata_generated)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn list_by_date(&self, date: &str) -> Result<Vec<Dish>, StoreError> {
        let rows = sqlx::query(&format!("{} WHERE datum = ? ORDER BY id", SELECT_COLUMNS))
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(dish_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> SqliteDishStore {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        mensa_common::db::create_schema(&pool).await.unwrap();
        SqliteDishStore::new(pool)
    }

    fn chili() -> NewDish {
        NewDish::new(
            "Chili sin Carne".to_string(),
            "2025-05-15".to_string(),
            Some("Menü vegan".to_string()),
            Some(3.2),
            vec!["bohnen".to_string(), "mais".to_string()],
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = setup_store().await;

        let inserted = store.insert(&chili()).await.unwrap();
        assert!(!inserted.metadata_generated);
        assert_eq!(inserted.ingredients, vec!["bohnen", "mais"]);

        let found = store
            .find_by_name_and_date("Chili sin Carne", "2025-05-15")
            .await
            .unwrap()
            .expect("Dish not found");
        assert_eq!(found, inserted);

        let other_day = store
            .find_by_name_and_date("Chili sin Carne", "2025-05-16")
            .await
            .unwrap();
        assert!(other_day.is_none());
    }

    #[tokio::test]
    async fn test_metadata_then_sync_update_resets_flag() {
        let store = setup_store().await;
        let dish = store.insert(&chili()).await.unwrap();

        let metadata = DishMetadata {
            display_name: Some("Chili sin Carne".to_string()),
            description: "Herzhaftes veganes Chili.".to_string(),
            tags: vec!["vegan".to_string()],
            calories: 450.0,
            fat: 12.0,
            protein: 18.0,
            carbohydrates: 60.0,
            image_url: "https://images.example/chili.jpg".to_string(),
            metadata_generated: true,
        };
        store.store_metadata(dish.id, &metadata).await.unwrap();
        assert!(store.list_pending().await.unwrap().is_empty());

        let changes = DishChanges::new(Some("Menü vegan".to_string()), Some(3.5), vec!["bohnen".to_string()]);
        store.update_sync_fields(dish.id, &changes).await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].price, Some(3.5));
        // Backfill-owned fields survive the sync update
        assert_eq!(pending[0].description.as_deref(), Some("Herzhaftes veganes Chili."));
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let store = setup_store().await;
        let changes = DishChanges::new(None, None, vec![]);

        let result = store.update_sync_fields(42, &changes).await;
        assert!(matches!(result, Err(StoreError::NotFound(42))));
    }

    #[tokio::test]
    async fn test_list_by_date() {
        let store = setup_store().await;
        store.insert(&chili()).await.unwrap();

        let mut next_day = chili();
        next_day.date = "2025-05-16".to_string();
        store.insert(&next_day).await.unwrap();

        let dishes = store.list_by_date("2025-05-16").await.unwrap();
        assert_eq!(dishes.len(), 1);
        assert_eq!(dishes[0].date, "2025-05-16");
    }
}
