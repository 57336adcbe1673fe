//! Configuration loading and root folder resolution
//!
//! Configuration comes from an optional TOML file. A missing file is not an
//! error: the service starts with compiled defaults and logs a warning.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "MENSA_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "mensa.db";

/// Default text-generation endpoint (chat completions wire format)
pub const DEFAULT_TEXT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default text-generation model
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4o-mini";

/// Default image-search endpoint
pub const DEFAULT_IMAGE_API_URL: &str = "https://api.pexels.com/v1/search";

/// Default operator API port
pub const DEFAULT_PORT: u16 = 5790;

/// Categories synced when the config file names none
pub const DEFAULT_ALLOWED_CATEGORIES: [&str; 2] = ["Menü vegan", "Menü vegetarisch"];

/// Which persistence backend holds the dish table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local SQLite file in the root folder
    #[default]
    Sqlite,
    /// Hosted PostgREST-compatible table
    Rest,
}

/// Contents of `mensa-sync.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Operator API port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Menu feed endpoint returning today's dishes
    #[serde(default)]
    pub feed_url: Option<String>,

    /// Categories kept by the category filter (compared trimmed, case-insensitive)
    #[serde(default = "default_allowed_categories")]
    pub allowed_categories: Vec<String>,

    /// Text-generation endpoint
    #[serde(default = "default_text_api_url")]
    pub text_api_url: String,

    /// Text-generation bearer token
    #[serde(default)]
    pub text_api_key: Option<String>,

    /// Text-generation model name
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Image-search endpoint
    #[serde(default = "default_image_api_url")]
    pub image_api_url: String,

    /// Image-search API key
    #[serde(default)]
    pub image_api_key: Option<String>,

    /// Persistence backend
    #[serde(default)]
    pub store: StoreBackend,

    /// Base URL of the hosted store (required when `store = "rest"`)
    #[serde(default)]
    pub rest_url: Option<String>,

    /// API key of the hosted store
    #[serde(default)]
    pub rest_api_key: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_allowed_categories() -> Vec<String> {
    DEFAULT_ALLOWED_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

fn default_text_api_url() -> String {
    DEFAULT_TEXT_API_URL.to_string()
}

fn default_text_model() -> String {
    DEFAULT_TEXT_MODEL.to_string()
}

fn default_image_api_url() -> String {
    DEFAULT_IMAGE_API_URL.to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            feed_url: None,
            allowed_categories: default_allowed_categories(),
            text_api_url: default_text_api_url(),
            text_api_key: None,
            text_model: default_text_model(),
            image_api_url: default_image_api_url(),
            image_api_key: None,
            store: StoreBackend::default(),
            rest_url: None,
            rest_api_key: None,
        }
    }
}

/// Default location of the config file: `<config_dir>/mensa/mensa-sync.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mensa").join("mensa-sync.toml"))
}

/// Load the TOML config from `path`
///
/// A missing file yields the defaults. A file that exists but cannot be
/// parsed is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Root folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. `MENSA_ROOT_FOLDER` environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mensa"))
        .unwrap_or_else(|| PathBuf::from("./mensa_data"))
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder)?;
    Ok(root_folder.join(DATABASE_FILE_NAME))
}
