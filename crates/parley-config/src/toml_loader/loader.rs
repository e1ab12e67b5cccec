//! Core TOML config loading: read from a path or the discovered location.

use crate::schema::ParleyConfig;
use parley_common::ConfigError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

use super::paths::{create_default_config, discover_config, ConfigLocation};

/// Load config from a specific TOML file path.
///
/// Deserializes the file using serde defaults for any missing fields.
/// Validation is left to the caller.
pub fn load_from_path(path: &Path) -> Result<ParleyConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };

    let config: ParleyConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from wherever [`discover_config`] points.
///
/// A missing `$PARLEY_CONFIG` file is an error. A missing per-user file is
/// created from the template and defaults are returned.
pub fn load_default() -> Result<ParleyConfig, ConfigError> {
    let location = discover_config()?;

    match (load_from_path(location.path()), &location) {
        (Err(ConfigError::FileNotFound(_)), ConfigLocation::UserDefault(path)) => {
            info!("no config found at {}, creating default", path.display());
            create_default_config(path)?;
            Ok(ParleyConfig::default())
        }
        (result, _) => result,
    }
}
