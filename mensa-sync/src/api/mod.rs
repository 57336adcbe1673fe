//! Operator HTTP API
//!
//! Health, manual run triggers, read access to stored dishes and API key
//! configuration.

pub mod dishes;
pub mod health;
pub mod runs;
pub mod settings;

pub use dishes::dish_routes;
pub use health::health_routes;
pub use runs::run_routes;
pub use settings::settings_routes;
