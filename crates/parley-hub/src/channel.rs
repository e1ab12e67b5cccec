//! Validated channel names.

use std::fmt;

use parley_common::{ChannelKind, HubError};
use parley_config::validation::is_valid_channel_name;

/// A channel name that passed validation, with its kind resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName {
    name: String,
    kind: ChannelKind,
}

impl ChannelName {
    pub fn parse(name: &str) -> Result<Self, HubError> {
        if !is_valid_channel_name(name) {
            return Err(HubError::InvalidChannel(name.to_string()));
        }
        let kind = ChannelKind::of(name);
        let bare = match kind {
            ChannelKind::Public => name,
            ChannelKind::Private => &name[ChannelKind::PRIVATE_PREFIX.len()..],
            ChannelKind::Presence => &name[ChannelKind::PRESENCE_PREFIX.len()..],
        };
        if bare.is_empty() {
            return Err(HubError::InvalidChannel(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            kind,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}
