//! Service configuration resolution
//!
//! API keys resolve with Database → ENV → TOML priority. The resolved
//! configuration is then turned into a ready [`SyncOrchestrator`].

use mensa_common::config::{StoreBackend, TomlConfig};
use mensa_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::settings::{IMAGE_API_KEY, REST_API_KEY, TEXT_API_KEY};
use crate::db::{DishStore, RestDishStore, SqliteDishStore};
use crate::services::{
    Backfiller, CategoryFilter, ImageSearchClient, MenuClient, SyncOrchestrator,
    TextGenerationClient,
};

/// Environment variable holding the text-generation key
pub const TEXT_API_KEY_ENV: &str = "MENSA_TEXT_API_KEY";

/// Environment variable holding the image-search key
pub const IMAGE_API_KEY_ENV: &str = "MENSA_IMAGE_API_KEY";

/// Environment variable holding the hosted store key
pub const REST_API_KEY_ENV: &str = "MENSA_REST_API_KEY";

/// Resolve a secret from the 3-tier configuration
///
/// **Priority:** Database → ENV → TOML. Blank values are ignored at every
/// tier. Returns `Ok(None)` when no tier holds a usable value.
pub async fn resolve_secret(
    db: &Pool<Sqlite>,
    setting_key: &str,
    env_var: &str,
    toml_value: Option<&str>,
) -> Result<Option<String>> {
    let db_key = crate::db::settings::get_setting::<String>(db, setting_key)
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_value.filter(|k| is_valid_key(k)).map(str::to_string);

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            setting_key,
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        info!("{} loaded from database", setting_key);
        return Ok(Some(key));
    }

    if let Some(key) = env_key {
        info!("{} loaded from environment variable {}", setting_key, env_var);
        return Ok(Some(key));
    }

    if let Some(key) = toml_key {
        info!("{} loaded from TOML config", setting_key);
        return Ok(Some(key));
    }

    Ok(None)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Build the dish store selected by `store` in the TOML config
pub async fn build_store(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Arc<dyn DishStore>> {
    match toml_config.store {
        StoreBackend::Sqlite => {
            info!("Dish store: local SQLite");
            Ok(Arc::new(SqliteDishStore::new(db.clone())))
        }
        StoreBackend::Rest => {
            let base_url = toml_config
                .rest_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| {
                    Error::Config("store = \"rest\" requires rest_url in mensa-sync.toml".to_string())
                })?;

            let api_key = resolve_secret(
                db,
                REST_API_KEY,
                REST_API_KEY_ENV,
                toml_config.rest_api_key.as_deref(),
            )
            .await?
            .ok_or_else(|| {
                Error::Config(format!(
                    "Hosted store key not configured. Set {} or rest_api_key in mensa-sync.toml",
                    REST_API_KEY_ENV
                ))
            })?;

            info!(url = %base_url, "Dish store: hosted REST table");
            let store = RestDishStore::new(base_url, api_key)
                .map_err(|e| Error::Config(format!("Hosted store client: {}", e)))?;
            Ok(Arc::new(store))
        }
    }
}

/// Assemble the orchestrator from configuration
///
/// A missing feed URL is fatal. Missing text or image keys only disable the
/// backfill stage.
pub async fn build_orchestrator(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
    store: Arc<dyn DishStore>,
) -> Result<SyncOrchestrator> {
    let feed_url = toml_config
        .feed_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| {
            Error::Config(
                "Menu feed not configured. Set feed_url in mensa-sync.toml".to_string(),
            )
        })?;

    let menu_client =
        MenuClient::new(feed_url).map_err(|e| Error::Config(format!("Menu client: {}", e)))?;
    let filter = CategoryFilter::new(&toml_config.allowed_categories);

    let text_key = resolve_secret(
        db,
        TEXT_API_KEY,
        TEXT_API_KEY_ENV,
        toml_config.text_api_key.as_deref(),
    )
    .await?;
    let image_key = resolve_secret(
        db,
        IMAGE_API_KEY,
        IMAGE_API_KEY_ENV,
        toml_config.image_api_key.as_deref(),
    )
    .await?;

    let mut orchestrator =
        SyncOrchestrator::new(menu_client, filter, Arc::clone(&store)).with_settings_db(db.clone());

    match (text_key, image_key) {
        (Some(text_key), Some(image_key)) => {
            let text_client = TextGenerationClient::new(
                &toml_config.text_api_url,
                text_key,
                &toml_config.text_model,
            )
            .map_err(|e| Error::Config(format!("Text-generation client: {}", e)))?;
            let image_client = ImageSearchClient::new(&toml_config.image_api_url, image_key)
                .map_err(|e| Error::Config(format!("Image-search client: {}", e)))?;

            orchestrator = orchestrator.with_backfiller(Backfiller::new(store, text_client, image_client));
        }
        (text_key, image_key) => {
            warn!(
                text_key = text_key.is_some(),
                image_key = image_key.is_some(),
                "Metadata backfill disabled: set {} and {}",
                TEXT_API_KEY_ENV,
                IMAGE_API_KEY_ENV
            );
        }
    }

    Ok(orchestrator)
}
