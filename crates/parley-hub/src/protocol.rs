//! Wire protocol: JSON text frames in both directions.
//!
//! Inbound frames are tagged by `action`; outbound frames are flat objects
//! keyed by `event`, with only the fields the event needs.

use std::sync::Arc;

use parley_common::{ConnectionId, HubError, Identity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A serialized outbound frame, shared between every recipient of a fan-out.
pub type Frame = Arc<str>;

/// Event names with this prefix are client events (typing indicators and the like).
pub const CLIENT_EVENT_PREFIX: &str = "client-";

/// Outbound event names generated by the hub itself.
pub mod events {
    pub const CONNECTION_ESTABLISHED: &str = "connection_established";
    pub const SUBSCRIPTION_SUCCEEDED: &str = "subscription_succeeded";
    pub const SUBSCRIPTION_ERROR: &str = "subscription_error";
    pub const UNSUBSCRIBED: &str = "unsubscribed";
    pub const MEMBER_ADDED: &str = "member_added";
    pub const MEMBER_REMOVED: &str = "member_removed";
    pub const PONG: &str = "pong";
    pub const ERROR: &str = "error";
}

// ---------------------------------------------------------------------------
// Client -> hub
// ---------------------------------------------------------------------------

/// A frame as sent by a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe {
        channel: String,
    },
    Unsubscribe {
        channel: String,
    },
    Publish {
        channel: String,
        event: String,
        #[serde(default)]
        payload: Value,
        /// Only honoured for the trusted publisher.
        #[serde(default)]
        exclude: Option<ConnectionId>,
    },
    Ping,
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Subscribe {
        channel: String,
    },
    Unsubscribe {
        channel: String,
    },
    Publish {
        channel: String,
        event: String,
        payload: Value,
        exclude: Option<ConnectionId>,
    },
    ClientEvent {
        channel: String,
        event: String,
        payload: Value,
    },
    Ping,
}

impl From<ClientFrame> for Request {
    fn from(frame: ClientFrame) -> Self {
        match frame {
            ClientFrame::Subscribe { channel } => Request::Subscribe { channel },
            ClientFrame::Unsubscribe { channel } => Request::Unsubscribe { channel },
            ClientFrame::Publish {
                channel,
                event,
                payload,
                ..
            } if event.starts_with(CLIENT_EVENT_PREFIX) => Request::ClientEvent {
                channel,
                event,
                payload,
            },
            ClientFrame::Publish {
                channel,
                event,
                payload,
                exclude,
            } => Request::Publish {
                channel,
                event,
                payload,
                exclude,
            },
            ClientFrame::Ping => Request::Ping,
        }
    }
}

/// Decode one inbound text frame.
pub fn decode(text: &str) -> Result<Request, HubError> {
    let frame: ClientFrame =
        serde_json::from_str(text).map_err(|e| HubError::Protocol(e.to_string()))?;
    if let ClientFrame::Publish { event, .. } = &frame {
        if event.is_empty() {
            return Err(HubError::Protocol("publish requires a non-empty event".into()));
        }
    }
    Ok(frame.into())
}

// ---------------------------------------------------------------------------
// Hub -> client
// ---------------------------------------------------------------------------

/// A frame the hub sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<Identity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Served if a frame somehow fails to serialize.
const ENCODE_FAILURE: &str = r#"{"event":"error","code":"internal","message":"failed to encode frame"}"#;

impl ServerFrame {
    fn named(event: &str) -> Self {
        Self {
            event: event.to_string(),
            channel: None,
            payload: None,
            identity: None,
            members: None,
            connection_id: None,
            code: None,
            message: None,
        }
    }

    fn on(mut self, channel: &str) -> Self {
        self.channel = Some(channel.to_string());
        self
    }

    /// An application event: `{"event", "channel", "payload"}`.
    pub fn event(channel: &str, event: &str, payload: Value) -> Self {
        let mut frame = Self::named(event).on(channel);
        frame.payload = Some(payload);
        frame
    }

    pub fn connection_established(id: &ConnectionId) -> Self {
        let mut frame = Self::named(events::CONNECTION_ESTABLISHED);
        frame.connection_id = Some(id.clone());
        frame
    }

    /// `members` is only present for presence channels.
    pub fn subscription_succeeded(channel: &str, members: Option<Vec<Identity>>) -> Self {
        let mut frame = Self::named(events::SUBSCRIPTION_SUCCEEDED).on(channel);
        frame.members = members;
        frame
    }

    pub fn subscription_error(channel: &str, err: &HubError) -> Self {
        let mut frame = Self::named(events::SUBSCRIPTION_ERROR).on(channel);
        frame.code = Some(err.code().to_string());
        frame.message = Some(err.to_string());
        frame
    }

    pub fn unsubscribed(channel: &str) -> Self {
        Self::named(events::UNSUBSCRIBED).on(channel)
    }

    pub fn member_added(channel: &str, identity: Identity) -> Self {
        let mut frame = Self::named(events::MEMBER_ADDED).on(channel);
        frame.identity = Some(identity);
        frame
    }

    pub fn member_removed(channel: &str, identity: Identity) -> Self {
        let mut frame = Self::named(events::MEMBER_REMOVED).on(channel);
        frame.identity = Some(identity);
        frame
    }

    pub fn pong() -> Self {
        Self::named(events::PONG)
    }

    pub fn error(err: &HubError) -> Self {
        let mut frame = Self::named(events::ERROR);
        frame.code = Some(err.code().to_string());
        frame.message = Some(err.to_string());
        frame
    }

    pub fn encode(&self) -> Frame {
        match serde_json::to_string(self) {
            Ok(json) => Frame::from(json),
            Err(e) => {
                warn!(event = %self.event, error = %e, "Failed to encode frame");
                Frame::from(ENCODE_FAILURE)
            }
        }
    }
}
