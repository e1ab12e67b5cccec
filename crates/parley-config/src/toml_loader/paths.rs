//! Where the hub looks for its config file when `--config` is not given.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parley_common::ConfigError;
use tracing::info;

use super::template::default_config_toml;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "PARLEY_CONFIG";

/// File picked up from the working directory.
pub const LOCAL_CONFIG_FILE: &str = "parley.toml";

/// How a config path was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Named by `$PARLEY_CONFIG`; must exist.
    Env(PathBuf),
    /// `parley.toml` in the working directory.
    WorkingDir(PathBuf),
    /// The per-user file, created with defaults if missing.
    UserDefault(PathBuf),
}

impl ConfigLocation {
    pub fn path(&self) -> &Path {
        match self {
            ConfigLocation::Env(path)
            | ConfigLocation::WorkingDir(path)
            | ConfigLocation::UserDefault(path) => path,
        }
    }
}

/// Per-user config path, e.g. `~/.config/parley/config.toml` on Linux.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::ParseError("could not determine config directory".into()))?;
    Ok(config_dir.join("parley").join("config.toml"))
}

/// Find the config file: `$PARLEY_CONFIG`, then `./parley.toml`, then the
/// per-user default.
pub fn discover_config() -> Result<ConfigLocation, ConfigError> {
    let cwd = std::env::current_dir().unwrap_or_default();
    discover_in(std::env::var_os(CONFIG_ENV), &cwd)
}

pub(super) fn discover_in(env: Option<OsString>, cwd: &Path) -> Result<ConfigLocation, ConfigError> {
    if let Some(path) = env.filter(|p| !p.is_empty()) {
        return Ok(ConfigLocation::Env(PathBuf::from(path)));
    }
    let local = cwd.join(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Ok(ConfigLocation::WorkingDir(local));
    }
    default_config_path().map(ConfigLocation::UserDefault)
}

/// Write the commented default template to `path`.
///
/// An existing file is left alone.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_err = |what: &str, e: std::io::Error| {
        ConfigError::ParseError(format!("failed to {what} {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err("create directory for", e))?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
        Err(e) => return Err(io_err("create", e)),
    };
    file.write_all(default_config_toml().as_bytes())
        .map_err(|e| io_err("write default config to", e))?;

    info!(path = %path.display(), "Wrote default config");
    Ok(())
}
