//! Boundary backed by the `[[auth.tokens]]` table of the config file.

use std::collections::HashMap;

use async_trait::async_trait;
use parley_common::{HubError, Identity};
use parley_config::TokenGrant;

use super::Boundary;
use crate::channel::ChannelName;
use crate::connection::Connection;

/// Check whether a channel name matches a grant pattern.
///
/// Patterns are split on `.`: `*` matches exactly one segment, `>` matches
/// one or more trailing segments.
///
/// - `private-chat.*` matches `private-chat.1`, not `private-chat.1.2`
/// - `presence-room.>` matches `presence-room.1` and `presence-room.1.2`
/// - `>` matches everything
pub fn matches_channel(pattern: &str, channel: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let channel: Vec<&str> = channel.split('.').collect();

    let mut pi = 0;
    let mut ci = 0;
    while pi < pattern.len() && ci < channel.len() {
        match pattern[pi] {
            ">" => return true,
            "*" => {}
            p if p == channel[ci] => {}
            _ => return false,
        }
        pi += 1;
        ci += 1;
    }
    pi == pattern.len() && ci == channel.len()
}

struct Grant {
    identity: Identity,
    channels: Vec<String>,
}

/// Resolves identities from a fixed token table.
pub struct StaticBoundary {
    by_token: HashMap<String, Identity>,
    /// Keyed by the identity's `id` rendered as JSON, so `1` and `"1"` differ.
    grants: HashMap<String, Vec<Grant>>,
}

impl StaticBoundary {
    pub fn from_grants(tokens: &[TokenGrant]) -> Self {
        let mut by_token = HashMap::new();
        let mut grants: HashMap<String, Vec<Grant>> = HashMap::new();
        for grant in tokens {
            by_token.insert(grant.token.clone(), grant.identity.clone());
            grants
                .entry(grant.identity.id.to_string())
                .or_default()
                .push(Grant {
                    identity: grant.identity.clone(),
                    channels: grant.channels.clone(),
                });
        }
        Self { by_token, grants }
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

#[async_trait]
impl Boundary for StaticBoundary {
    async fn resolve_identity(&self, connection: &Connection) -> Result<Option<Identity>, HubError> {
        Ok(connection
            .credentials()
            .token
            .as_deref()
            .and_then(|token| self.by_token.get(token))
            .cloned())
    }

    async fn check_channel_access(
        &self,
        identity: &Identity,
        channel: &ChannelName,
    ) -> Result<bool, HubError> {
        let Some(grants) = self.grants.get(&identity.id.to_string()) else {
            return Ok(false);
        };
        Ok(grants
            .iter()
            .filter(|grant| grant.identity == *identity)
            .flat_map(|grant| grant.channels.iter())
            .any(|pattern| matches_channel(pattern, channel.as_str())))
    }
}
