//! Channel and delivery settings.

use parley_common::ChannelKind;
use serde::{Deserialize, Serialize};

/// `[channels]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Frames buffered per connection before it is disconnected as too slow.
    pub outbound_queue: u32,
    pub max_channels_per_connection: u32,
    /// Channel kinds on which subscribers may send `client-*` events.
    pub client_events: Vec<ChannelKind>,
    /// Channel kinds on which subscribers may publish regular events.
    pub client_publish: Vec<ChannelKind>,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 256,
            max_channels_per_connection: 100,
            client_events: vec![ChannelKind::Private, ChannelKind::Presence],
            client_publish: Vec::new(),
        }
    }
}
