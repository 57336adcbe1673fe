//! Metadata returned by the text-generation service
//!
//! The model is asked for a JSON object, but it usually wraps the object in a
//! markdown code fence. Parsing strips the fence, then deserializes.

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Closed tag vocabulary; generated tags outside this set are dropped
pub const ALLOWED_TAGS: [&str; 10] = [
    "vegan",
    "vegetarisch",
    "scharf",
    "glutenfrei",
    "laktosefrei",
    "proteinreich",
    "kalorienarm",
    "süß",
    "herzhaft",
    "regional",
];

/// Generated content could not be used
#[derive(Debug, Error, PartialEq)]
pub enum ParseMetadataError {
    #[error("Empty response content")]
    Empty,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

/// Parsed text-generation answer
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedMetadata {
    #[serde(default)]
    pub anzeigename: Option<String>,
    #[serde(default)]
    pub beschreibung: Option<String>,
    /// English search phrase for the image service
    #[serde(default)]
    pub bild_suche: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub naehrwerte_kcal: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub naehrwerte_fett: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub naehrwerte_protein: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub naehrwerte_kohlenhydrate: Option<f64>,
}

/// Nutrition estimates, all four present
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nutrition {
    pub calories: f64,
    pub fat: f64,
    pub protein: f64,
    pub carbohydrates: f64,
}

impl GeneratedMetadata {
    /// Description, rejecting a blank one
    pub fn description(&self) -> Result<&str, ParseMetadataError> {
        self.beschreibung
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(ParseMetadataError::MissingField("beschreibung"))
    }

    /// All four nutrition values, or the first missing field
    pub fn nutrition(&self) -> Result<Nutrition, ParseMetadataError> {
        Ok(Nutrition {
            calories: self
                .naehrwerte_kcal
                .ok_or(ParseMetadataError::MissingField("naehrwerte_kcal"))?,
            fat: self
                .naehrwerte_fett
                .ok_or(ParseMetadataError::MissingField("naehrwerte_fett"))?,
            protein: self
                .naehrwerte_protein
                .ok_or(ParseMetadataError::MissingField("naehrwerte_protein"))?,
            carbohydrates: self
                .naehrwerte_kohlenhydrate
                .ok_or(ParseMetadataError::MissingField("naehrwerte_kohlenhydrate"))?,
        })
    }

    /// Image search phrase, falling back to the dish name
    pub fn image_query<'a>(&'a self, dish_name: &'a str) -> &'a str {
        self.bild_suche
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(dish_name)
    }
}

/// Parse generated content, tolerating a surrounding markdown code fence
pub fn parse_generated_metadata(content: &str) -> Result<GeneratedMetadata, ParseMetadataError> {
    let json = strip_code_fence(content);
    if json.is_empty() {
        return Err(ParseMetadataError::Empty);
    }

    serde_json::from_str(json).map_err(|e| ParseMetadataError::InvalidJson(e.to_string()))
}

/// Remove a surrounding ```` ```json ```` fence
///
/// The fence may open and close on the same line as the JSON. The `json`
/// info string is matched case-insensitively; any other info string must
/// sit on the opening line by itself.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest.trim_start();
    let body = match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ if !rest.starts_with(['{', '[']) => match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest,
        },
        _ => rest,
    };

    let body = body.trim();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Keep tags that are in `allowed`, compared trimmed and case-insensitive
///
/// Returned tags use the vocabulary spelling, in response order, without
/// duplicates.
pub fn filter_tags(tags: &[String], allowed: &[&str]) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();

    for tag in tags {
        let wanted = tag.trim().to_lowercase();
        if let Some(canonical) = allowed.iter().find(|a| a.to_lowercase() == wanted) {
            if !kept.iter().any(|k| k == canonical) {
                kept.push(canonical.to_string());
            }
        }
    }

    kept
}

/// Accept `450`, `450.5` or `"450"` (models sometimes quote numbers)
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .trim_end_matches(|c: char| c.is_alphabetic() || c.is_whitespace())
            .replace(',', ".")
            .parse()
            .ok(),
        _ => None,
    })
}
