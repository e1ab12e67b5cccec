//! WebSocket transport: accepts sockets, runs the handshake, and drives one
//! session per connection.

mod handshake;
mod listener;
mod session;

use std::time::Duration;

use parley_config::ServerConfig;

pub use listener::{Listener, MAX_CONSECUTIVE_ACCEPT_ERRORS};

/// Timing and size limits for sessions.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub handshake_timeout: Duration,
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
    pub max_frame_bytes: usize,
    pub shutdown_grace: Duration,
}

impl TransportSettings {
    pub fn from_config(server: &ServerConfig) -> Self {
        Self {
            handshake_timeout: Duration::from_secs(u64::from(server.handshake_timeout_secs)),
            ping_interval: Duration::from_secs(u64::from(server.ping_interval_secs)),
            idle_timeout: Duration::from_secs(u64::from(server.idle_timeout_secs)),
            max_frame_bytes: server.max_frame_bytes as usize,
            shutdown_grace: Duration::from_secs(u64::from(server.shutdown_grace_secs)),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}
