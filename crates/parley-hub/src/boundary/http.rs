//! Boundary that asks the application over HTTP.
//!
//! Identity: `POST identity_url {"token": .., "peer": ..}` answers `200` with
//! an identity object, or `401`/`403`/`404` for "nobody".
//! Access: `POST access_url {"identity": .., "channel": ..}` answers `200`
//! with `{"allowed": bool}`, or `401`/`403` for "no".
//!
//! Anything else, including transport errors, is `BoundaryUnavailable`.

use std::time::Duration;

use async_trait::async_trait;
use parley_common::{HubError, Identity};
use parley_config::HttpBoundaryConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Boundary;
use crate::channel::ChannelName;
use crate::connection::Connection;

#[derive(Serialize)]
struct IdentityRequest<'a> {
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer: Option<String>,
}

#[derive(Serialize)]
struct AccessRequest<'a> {
    identity: &'a Identity,
    channel: &'a str,
}

#[derive(Deserialize)]
struct AccessReply {
    allowed: bool,
}

pub struct HttpBoundary {
    http: reqwest::Client,
    identity_url: String,
    access_url: String,
}

fn unavailable(e: impl std::fmt::Display) -> HubError {
    HubError::BoundaryUnavailable(e.to_string())
}

impl HttpBoundary {
    pub fn new(config: &HttpBoundaryConfig, timeout_ms: u32) -> Result<Self, HubError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(u64::from(timeout_ms)))
            .build()
            .map_err(unavailable)?;
        Ok(Self {
            http,
            identity_url: config.identity_url.clone(),
            access_url: config.access_url.clone(),
        })
    }
}

#[async_trait]
impl Boundary for HttpBoundary {
    async fn resolve_identity(&self, connection: &Connection) -> Result<Option<Identity>, HubError> {
        let credentials = connection.credentials();
        let Some(token) = credentials.token.as_deref() else {
            return Ok(None);
        };
        let body = IdentityRequest {
            token,
            peer: credentials.peer.map(|addr| addr.to_string()),
        };

        let response = self
            .http
            .post(&self.identity_url)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        debug!(connection = %connection.id(), %status, "Identity lookup");
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let identity: Identity = response.json().await.map_err(unavailable)?;
                Ok(Some(identity))
            }
            s => Err(unavailable(format!("identity endpoint returned HTTP {s}"))),
        }
    }

    async fn check_channel_access(
        &self,
        identity: &Identity,
        channel: &ChannelName,
    ) -> Result<bool, HubError> {
        let body = AccessRequest {
            identity,
            channel: channel.as_str(),
        };

        let response = self
            .http
            .post(&self.access_url)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        debug!(channel = %channel, %status, "Access check");
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            s if s.is_success() => {
                let reply: AccessReply = response.json().await.map_err(unavailable)?;
                Ok(reply.allowed)
            }
            s => Err(unavailable(format!("access endpoint returned HTTP {s}"))),
        }
    }
}
