//! # Mensa Common Library
//!
//! Shared code for the Mensa menu services:
//! - Error type shared by all crates
//! - Configuration loading (TOML file, root folder resolution)
//! - SQLite initialization and the dish record model

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
