//! Presence rosters: who is on each presence channel, in join order.
//!
//! The tracker lives inside the registry's state and is only touched under
//! its write lock, so joins and leaves are ordered with every other
//! membership change on the channel.

use std::collections::HashMap;

use parley_common::{ConnectionId, Identity};

use crate::protocol::ServerFrame;

/// Outcome of a presence join.
#[derive(Debug)]
pub struct PresenceJoin {
    /// Roster before the join, for the joiner's `subscription_succeeded`.
    pub members: Vec<Identity>,
    /// `member_added`, for everyone except the joiner.
    pub announcement: ServerFrame,
}

#[derive(Debug, Default)]
pub struct PresenceTracker {
    rosters: HashMap<String, Vec<(ConnectionId, Identity)>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_join(
        &mut self,
        channel: &str,
        connection: &ConnectionId,
        identity: Identity,
    ) -> PresenceJoin {
        let roster = self.rosters.entry(channel.to_string()).or_default();
        let members = roster
            .iter()
            .filter(|(id, _)| id != connection)
            .map(|(_, identity)| identity.clone())
            .collect();
        if !roster.iter().any(|(id, _)| id == connection) {
            roster.push((connection.clone(), identity.clone()));
        }
        PresenceJoin {
            members,
            announcement: ServerFrame::member_added(channel, identity),
        }
    }

    /// Returns `member_removed` the first time a connection leaves, `None` after.
    pub fn on_leave(&mut self, channel: &str, connection: &ConnectionId) -> Option<ServerFrame> {
        let roster = self.rosters.get_mut(channel)?;
        let pos = roster.iter().position(|(id, _)| id == connection)?;
        let (_, identity) = roster.remove(pos);
        if roster.is_empty() {
            self.rosters.remove(channel);
        }
        Some(ServerFrame::member_removed(channel, identity))
    }

    pub fn current_members(&self, channel: &str) -> Vec<Identity> {
        self.rosters
            .get(channel)
            .map(|roster| roster.iter().map(|(_, identity)| identity.clone()).collect())
            .unwrap_or_default()
    }

    /// Roster as seen by `connection`: everyone but itself.
    pub fn members_excluding(&self, channel: &str, connection: &ConnectionId) -> Vec<Identity> {
        self.rosters
            .get(channel)
            .map(|roster| {
                roster
                    .iter()
                    .filter(|(id, _)| id != connection)
                    .map(|(_, identity)| identity.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn channel_count(&self) -> usize {
        self.rosters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::events;

    fn ann() -> Identity {
        Identity::new(1).with_info("name", "Ann")
    }

    fn bo() -> Identity {
        Identity::new(2).with_info("name", "Bo")
    }

    #[test]
    fn join_returns_prior_roster_and_announcement() {
        let mut tracker = PresenceTracker::new();
        let a = ConnectionId::from("a");
        let b = ConnectionId::from("b");

        let first = tracker.on_join("presence-room.1", &a, ann());
        assert!(first.members.is_empty());

        let second = tracker.on_join("presence-room.1", &b, bo());
        assert_eq!(second.members, vec![ann()]);
        assert_eq!(second.announcement.event, events::MEMBER_ADDED);
        assert_eq!(second.announcement.identity, Some(bo()));

        assert_eq!(tracker.current_members("presence-room.1"), vec![ann(), bo()]);
    }

    #[test]
    fn leave_fires_once() {
        let mut tracker = PresenceTracker::new();
        let a = ConnectionId::from("a");
        tracker.on_join("presence-room.1", &a, ann());

        let removed = tracker.on_leave("presence-room.1", &a).unwrap();
        assert_eq!(removed.event, events::MEMBER_REMOVED);
        assert_eq!(removed.identity, Some(ann()));

        assert!(tracker.on_leave("presence-room.1", &a).is_none());
        assert_eq!(tracker.channel_count(), 0);
    }

    #[test]
    fn rejoin_does_not_duplicate() {
        let mut tracker = PresenceTracker::new();
        let a = ConnectionId::from("a");
        tracker.on_join("presence-room.1", &a, ann());
        tracker.on_join("presence-room.1", &a, ann());
        assert_eq!(tracker.current_members("presence-room.1").len(), 1);
    }

    #[test]
    fn same_user_on_two_connections_is_listed_twice() {
        let mut tracker = PresenceTracker::new();
        tracker.on_join("presence-room.1", &ConnectionId::from("a1"), ann());
        tracker.on_join("presence-room.1", &ConnectionId::from("a2"), ann());
        assert_eq!(tracker.current_members("presence-room.1"), vec![ann(), ann()]);
        assert_eq!(
            tracker.members_excluding("presence-room.1", &ConnectionId::from("a1")),
            vec![ann()]
        );
    }

    #[test]
    fn unknown_channel_is_empty() {
        let tracker = PresenceTracker::new();
        assert!(tracker.current_members("presence-nowhere").is_empty());
    }
}
