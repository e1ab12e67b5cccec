//! The application boundary: where the hub asks "who is this?" and "may they
//! join that channel?".
//!
//! The hub never decides identity on its own. It hands the connection's
//! handshake credentials to a [`Boundary`] and trusts the answer.

mod http;
mod static_boundary;

use std::sync::Arc;

use async_trait::async_trait;
use parley_common::{HubError, Identity};
use parley_config::{AuthConfig, BoundaryKind};
use tracing::{info, warn};

use crate::channel::ChannelName;
use crate::connection::Connection;

pub use http::HttpBoundary;
pub use static_boundary::{matches_channel, StaticBoundary};

/// Identity and access decisions supplied by the application.
///
/// Implementations may block on I/O; the authorizer bounds every call with
/// its own timeout and treats an error as a denial.
#[async_trait]
pub trait Boundary: Send + Sync {
    /// Resolve the subscriber behind a connection, or `None` if anonymous.
    async fn resolve_identity(&self, connection: &Connection) -> Result<Option<Identity>, HubError>;

    /// Whether `identity` may join `channel`.
    async fn check_channel_access(
        &self,
        identity: &Identity,
        channel: &ChannelName,
    ) -> Result<bool, HubError>;
}

/// Refuses everyone. Public channels still work.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllBoundary;

#[async_trait]
impl Boundary for DenyAllBoundary {
    async fn resolve_identity(&self, _connection: &Connection) -> Result<Option<Identity>, HubError> {
        Ok(None)
    }

    async fn check_channel_access(
        &self,
        _identity: &Identity,
        _channel: &ChannelName,
    ) -> Result<bool, HubError> {
        Ok(false)
    }
}

/// Build the boundary selected by `auth.boundary`.
pub fn from_config(auth: &AuthConfig) -> Result<Arc<dyn Boundary>, HubError> {
    let boundary: Arc<dyn Boundary> = match auth.boundary {
        BoundaryKind::Static => {
            let boundary = StaticBoundary::from_grants(&auth.tokens);
            if boundary.is_empty() {
                warn!("Static boundary has no tokens; private and presence subscribes will be denied");
            } else {
                info!(tokens = boundary.len(), "Static boundary loaded");
            }
            Arc::new(boundary)
        }
        BoundaryKind::Http => Arc::new(HttpBoundary::new(&auth.http, auth.timeout_ms)?),
        BoundaryKind::Deny => Arc::new(DenyAllBoundary),
    };
    Ok(boundary)
}
