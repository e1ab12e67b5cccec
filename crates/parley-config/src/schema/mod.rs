//! Configuration schema types for the Parley hub.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod auth;
mod channels;
mod logging;
mod server;

pub use auth::*;
pub use channels::*;
pub use logging::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for the hub.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub server: ServerConfig,
    pub channels: ChannelsConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================
