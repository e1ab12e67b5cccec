//! Identity boundary configuration.

use parley_common::Identity;
use serde::{Deserialize, Serialize};

/// Which identity boundary the hub consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    /// Tokens and channel grants listed in this file.
    #[default]
    Static,
    /// The application's HTTP endpoints.
    Http,
    /// Nobody gets an identity; only public channels work.
    Deny,
}

/// A token the static boundary recognizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub identity: Identity,
    /// Channel patterns this identity may join (`*` = one segment, `>` = rest).
    #[serde(default)]
    pub channels: Vec<String>,
}

/// `[auth.http]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpBoundaryConfig {
    /// Receives `{"token": ...}`, answers with an identity object or 404.
    pub identity_url: String,
    /// Receives `{"identity": ..., "channel": ...}`, answers `{"allowed": bool}`.
    pub access_url: String,
}

/// `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub boundary: BoundaryKind,
    /// Per-call timeout for boundary lookups (valid range: 10-60000).
    pub timeout_ms: u32,
    /// Handshake token identifying the application back end as a publisher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_secret: Option<String>,
    pub tokens: Vec<TokenGrant>,
    pub http: HttpBoundaryConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            boundary: BoundaryKind::Static,
            timeout_ms: 2_000,
            publisher_secret: None,
            tokens: Vec::new(),
            http: HttpBoundaryConfig::default(),
        }
    }
}
