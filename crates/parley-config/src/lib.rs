//! Parley hub configuration.
//!
//! TOML-based configuration with full validation. Every section uses serde
//! defaults so a partial file (or no file at all) yields a working hub.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use parley_config::{load_config, config_to_json};
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    AuthConfig, BoundaryKind, ChannelsConfig, HttpBoundaryConfig, LogLevel, LoggingConfig,
    ParleyConfig, ServerConfig, TokenGrant, CONFIG_SCHEMA_VERSION,
};
pub use validation::CHANNEL_NAME_MAX_LEN;

use parley_common::ConfigError;
use std::path::Path;

/// Load config from `path`, or from the discovered location when `None`
/// (`$PARLEY_CONFIG`, `./parley.toml`, then the per-user file).
///
/// The result is always validated. An explicit path that does not exist is
/// an error, while a missing per-user file is created from the template.
pub fn load_config(path: Option<&Path>) -> Result<ParleyConfig, ConfigError> {
    let config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &ParleyConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
