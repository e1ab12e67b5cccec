use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Broadcast scope of a channel, derived from its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Public,
    Private,
    Presence,
}

impl ChannelKind {
    pub const PRIVATE_PREFIX: &'static str = "private-";
    pub const PRESENCE_PREFIX: &'static str = "presence-";

    pub fn of(name: &str) -> Self {
        if name.starts_with(Self::PRESENCE_PREFIX) {
            ChannelKind::Presence
        } else if name.starts_with(Self::PRIVATE_PREFIX) {
            ChannelKind::Private
        } else {
            ChannelKind::Public
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelKind::Public => "public",
            ChannelKind::Private => "private",
            ChannelKind::Presence => "presence",
        };
        f.write_str(s)
    }
}

/// Subscriber identity as resolved by the application.
///
/// On the wire this is a flat object: `{"id": 1, "name": "Ann"}`. Everything
/// besides `id` is displayable metadata the hub passes through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Value,
    #[serde(flatten)]
    pub info: Map<String, Value>,
}

impl Identity {
    pub fn new(id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            info: Map::new(),
        }
    }

    pub fn with_info(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.info.insert(key.to_string(), value.into());
        self
    }

    /// Identity id rendered for log fields.
    pub fn display_id(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_prefix() {
        assert_eq!(ChannelKind::of("public.chat"), ChannelKind::Public);
        assert_eq!(ChannelKind::of("private-chat.1"), ChannelKind::Private);
        assert_eq!(ChannelKind::of("presence-room.1"), ChannelKind::Presence);
        // Prefix must be at the start.
        assert_eq!(ChannelKind::of("chat.private-1"), ChannelKind::Public);
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&ChannelKind::Presence).unwrap();
        assert_eq!(json, "\"presence\"");
        let kind: ChannelKind = serde_json::from_str("\"private\"").unwrap();
        assert_eq!(kind, ChannelKind::Private);
    }

    #[test]
    fn identity_is_flat_on_the_wire() {
        let ann = Identity::new(1).with_info("name", "Ann");
        let json = serde_json::to_value(&ann).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "name": "Ann"}));

        let back: Identity = serde_json::from_value(json).unwrap();
        assert_eq!(back, ann);
    }

    #[test]
    fn identity_display_id() {
        assert_eq!(Identity::new(7).display_id(), "7");
        assert_eq!(Identity::new("u-7").display_id(), "u-7");
    }
}
