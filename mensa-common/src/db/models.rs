//! Database models
//!
//! Field names are English; the serde renames match the column names of the
//! `gerichte` table so the same types travel over the hosted REST store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Table holding dish records
pub const DISHES_TABLE: &str = "gerichte";

/// One menu item on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    /// Surrogate id assigned by the store
    pub id: i64,
    /// Name from the feed; with `date` the natural key
    pub name: String,
    #[serde(rename = "anzeigename", default)]
    pub display_name: Option<String>,
    #[serde(rename = "beschreibung", default)]
    pub description: Option<String>,
    #[serde(rename = "kategorie", default)]
    pub category: Option<String>,
    /// Student price
    #[serde(rename = "preis", default)]
    pub price: Option<f64>,
    #[serde(rename = "zutaten", default, deserialize_with = "null_as_empty")]
    pub ingredients: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(rename = "naehrwerte_kcal", default)]
    pub calories: Option<f64>,
    #[serde(rename = "naehrwerte_fett", default)]
    pub fat: Option<f64>,
    #[serde(rename = "naehrwerte_protein", default)]
    pub protein: Option<f64>,
    #[serde(rename = "naehrwerte_kohlenhydrate", default)]
    pub carbohydrates: Option<f64>,
    #[serde(rename = "bild_url", default)]
    pub image_url: Option<String>,
    /// Set once the backfill stage has written the generated fields
    #[serde(rename = "meta_generiert", default)]
    pub metadata_generated: bool,
    /// Serving date, `YYYY-MM-DD`
    #[serde(rename = "datum")]
    pub date: String,
    #[serde(rename = "erstellt_am")]
    pub created_at: DateTime<Utc>,
}

/// Row written when a dish is first seen in the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDish {
    pub name: String,
    #[serde(rename = "datum")]
    pub date: String,
    #[serde(rename = "kategorie")]
    pub category: Option<String>,
    #[serde(rename = "preis")]
    pub price: Option<f64>,
    #[serde(rename = "zutaten")]
    pub ingredients: Vec<String>,
    /// Always false on insert
    #[serde(rename = "meta_generiert")]
    pub metadata_generated: bool,
}

impl NewDish {
    pub fn new(
        name: String,
        date: String,
        category: Option<String>,
        price: Option<f64>,
        ingredients: Vec<String>,
    ) -> Self {
        Self {
            name,
            date,
            category,
            price,
            ingredients,
            metadata_generated: false,
        }
    }
}

/// Fields owned by the sync stage
///
/// Writing these always resets `meta_generiert` so the backfill stage
/// regenerates the descriptive fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishChanges {
    #[serde(rename = "kategorie")]
    pub category: Option<String>,
    #[serde(rename = "preis")]
    pub price: Option<f64>,
    #[serde(rename = "zutaten")]
    pub ingredients: Vec<String>,
    #[serde(rename = "meta_generiert")]
    pub metadata_generated: bool,
}

impl DishChanges {
    pub fn new(category: Option<String>, price: Option<f64>, ingredients: Vec<String>) -> Self {
        Self {
            category,
            price,
            ingredients,
            metadata_generated: false,
        }
    }
}

/// Fields owned by the backfill stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishMetadata {
    #[serde(rename = "anzeigename")]
    pub display_name: Option<String>,
    #[serde(rename = "beschreibung")]
    pub description: String,
    pub tags: Vec<String>,
    #[serde(rename = "naehrwerte_kcal")]
    pub calories: f64,
    #[serde(rename = "naehrwerte_fett")]
    pub fat: f64,
    #[serde(rename = "naehrwerte_protein")]
    pub protein: f64,
    #[serde(rename = "naehrwerte_kohlenhydrate")]
    pub carbohydrates: f64,
    #[serde(rename = "bild_url")]
    pub image_url: String,
    /// Always true when written
    #[serde(rename = "meta_generiert")]
    pub metadata_generated: bool,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
