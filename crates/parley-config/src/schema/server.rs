//! Listener and per-connection transport settings.

use serde::{Deserialize, Serialize};

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Concurrent connection limit (valid range: 1-1000000).
    pub max_connections: u32,
    /// Seconds allowed for the WebSocket upgrade (valid range: 1-120).
    pub handshake_timeout_secs: u32,
    /// Seconds between server pings (valid range: 1-3600).
    pub ping_interval_secs: u32,
    /// Seconds of client silence before the connection is closed.
    pub idle_timeout_secs: u32,
    /// Largest accepted inbound frame in bytes (valid range: 256-16777216).
    pub max_frame_bytes: u32,
    /// Seconds to wait for sessions to close on shutdown (valid range: 0-300).
    pub shutdown_grace_secs: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            max_connections: 10_000,
            handshake_timeout_secs: 10,
            ping_interval_secs: 30,
            idle_timeout_secs: 120,
            max_frame_bytes: 65_536,
            shutdown_grace_secs: 5,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
