use parley_common::ConnectionId;
use serde_json::Value;

use crate::protocol::{Frame, ServerFrame};

/// One published message. Immutable once built; the hub never stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub channel: String,
    pub name: String,
    pub payload: Value,
    /// Connection left out of the fan-out ("publish to others").
    pub exclude: Option<ConnectionId>,
}

impl Event {
    pub fn new(channel: impl Into<String>, name: impl Into<String>, payload: Value) -> Self {
        Self {
            channel: channel.into(),
            name: name.into(),
            payload,
            exclude: None,
        }
    }

    pub fn excluding(mut self, connection: ConnectionId) -> Self {
        self.exclude = Some(connection);
        self
    }

    pub(crate) fn frame(&self) -> Frame {
        ServerFrame::event(&self.channel, &self.name, self.payload.clone()).encode()
    }
}
