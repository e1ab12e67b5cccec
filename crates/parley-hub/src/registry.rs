//! Connection registry: the single authority on who is connected and which
//! channels each connection is subscribed to.
//!
//! All state sits behind one `RwLock`. Membership changes (subscribe,
//! unsubscribe, unregister) take the write lock; publishes take the read
//! lock plus the target channel's fan-out lock, so publishes on different
//! channels run in parallel while a single channel sees one total order of
//! events and membership changes.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use parley_common::{ChannelKind, ConnectionId, HubError, Identity};
use tracing::{debug, info, warn};

use crate::channel::ChannelName;
use crate::connection::{CloseReason, Connection};
use crate::presence::PresenceTracker;
use crate::protocol::{Frame, ServerFrame};
use crate::router::{deliver, deliver_one, Delivery};

/// Per-hub admission limits.
#[derive(Debug, Clone, Copy)]
pub struct RegistryLimits {
    pub max_connections: usize,
    pub max_channels_per_connection: usize,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            max_channels_per_connection: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionResult {
    Subscribed,
    /// Already a member; the acknowledgement was sent again and nothing changed.
    AlreadySubscribed,
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HubStats {
    pub connections: usize,
    pub channels: usize,
}

struct Member {
    conn: Arc<Connection>,
    channels: BTreeSet<String>,
}

struct Channel {
    kind: ChannelKind,
    members: BTreeMap<ConnectionId, Arc<Connection>>,
    /// Serializes fan-outs on this channel.
    fanout: Mutex<()>,
}

impl Channel {
    fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            members: BTreeMap::new(),
            fanout: Mutex::new(()),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, Member>,
    channels: HashMap<String, Channel>,
    presence: PresenceTracker,
    draining: bool,
}

/// Connections queued for removal inside one write-lock critical section.
type Evictions = VecDeque<(ConnectionId, CloseReason)>;

impl RegistryState {
    /// Remove every queued connection, announcing presence departures to the
    /// remaining members. Members that cannot take the announcement are
    /// queued too, so the cascade ends with a consistent registry.
    fn remove_queued(&mut self, mut queue: Evictions) -> usize {
        let mut removed = 0;
        while let Some((id, reason)) = queue.pop_front() {
            let Some(member) = self.connections.remove(&id) else {
                continue;
            };
            member.conn.close(reason);
            removed += 1;

            for name in &member.channels {
                let Some(channel) = self.channels.get_mut(name) else {
                    continue;
                };
                channel.members.remove(&id);
                if channel.kind == ChannelKind::Presence {
                    if let Some(frame) = self.presence.on_leave(name, &id) {
                        let delivery = deliver(channel.members.values(), &frame.encode(), None);
                        queue_slow(&mut queue, delivery);
                    }
                }
                if channel.members.is_empty() {
                    self.channels.remove(name);
                    debug!(channel = %name, "Channel dropped");
                }
            }

            info!(
                connection = %id,
                reason = reason.describe(),
                channels = member.channels.len(),
                connected_secs = (Utc::now() - member.conn.connected_at()).num_seconds(),
                "Connection removed"
            );
        }
        removed
    }
}

fn queue_slow(queue: &mut Evictions, delivery: Delivery) {
    queue.extend(
        delivery
            .evict
            .into_iter()
            .map(|id| (id, CloseReason::SlowConsumer)),
    );
}

/// Thread-safe registry of connections and channel memberships.
pub struct Registry {
    state: RwLock<RegistryState>,
    limits: RegistryLimits,
}

impl Registry {
    pub fn new(limits: RegistryLimits) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            limits,
        }
    }

    // A panic while holding the lock leaves the maps structurally valid, so
    // poisoning is not treated as fatal.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a connection.
    pub fn register(&self, conn: Arc<Connection>) -> Result<(), HubError> {
        let mut state = self.write();
        if state.draining {
            return Err(HubError::CapacityExceeded("hub is shutting down".into()));
        }
        if state.connections.len() >= self.limits.max_connections {
            return Err(HubError::CapacityExceeded(format!(
                "hub is at its limit of {} connections",
                self.limits.max_connections
            )));
        }
        let id = conn.id().clone();
        state.connections.insert(
            id.clone(),
            Member {
                conn,
                channels: BTreeSet::new(),
            },
        );
        info!(connection = %id, total = state.connections.len(), "Connection registered");
        Ok(())
    }

    /// Remove a connection and every membership it holds.
    ///
    /// Safe to call more than once; only the first call has any effect.
    pub fn unregister(&self, id: &ConnectionId, reason: CloseReason) -> bool {
        let mut state = self.write();
        state.remove_queued(VecDeque::from([(id.clone(), reason)])) > 0
    }

    /// Remove several connections in one critical section.
    pub fn unregister_all(&self, ids: Vec<ConnectionId>, reason: CloseReason) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let mut state = self.write();
        state.remove_queued(ids.into_iter().map(|id| (id, reason)).collect())
    }

    /// Add `id` to `channel`.
    ///
    /// The caller has already authorized the subscription; `identity` is the
    /// one the boundary resolved and is required for presence channels. The
    /// acknowledgement (and for presence, the roster and `member_added`) is
    /// queued before the lock is released, so no channel event can overtake it.
    pub fn subscribe(
        &self,
        id: &ConnectionId,
        channel: &ChannelName,
        identity: Option<Identity>,
    ) -> Result<SubscriptionResult, HubError> {
        let mut guard = self.write();
        let state = &mut *guard;
        let member = state
            .connections
            .get_mut(id)
            .ok_or_else(|| HubError::UnknownConnection(id.clone()))?;
        let conn = Arc::clone(&member.conn);
        let name = channel.as_str();
        let mut evictions = Evictions::new();

        if member.channels.contains(name) {
            let members = (channel.kind() == ChannelKind::Presence)
                .then(|| state.presence.members_excluding(name, id));
            let ack = ServerFrame::subscription_succeeded(name, members).encode();
            if let Some(slow) = deliver_one(&conn, ack) {
                evictions.push_back((slow, CloseReason::SlowConsumer));
                state.remove_queued(evictions);
            }
            return Ok(SubscriptionResult::AlreadySubscribed);
        }

        if member.channels.len() >= self.limits.max_channels_per_connection {
            return Err(HubError::CapacityExceeded(format!(
                "connection is subscribed to the maximum of {} channels",
                self.limits.max_channels_per_connection
            )));
        }
        let presence_identity = match channel.kind() {
            ChannelKind::Presence => Some(
                identity.ok_or_else(|| HubError::denied(name, "presence channels need an identity"))?,
            ),
            _ => None,
        };

        member.channels.insert(name.to_string());
        let entry = state
            .channels
            .entry(name.to_string())
            .or_insert_with(|| Channel::new(channel.kind()));

        let ack = match presence_identity {
            Some(identity) => {
                let join = state.presence.on_join(name, id, identity);
                let announcement = join.announcement.encode();
                let delivery = deliver(entry.members.values(), &announcement, Some(id));
                queue_slow(&mut evictions, delivery);
                ServerFrame::subscription_succeeded(name, Some(join.members))
            }
            None => ServerFrame::subscription_succeeded(name, None),
        };
        entry.members.insert(id.clone(), Arc::clone(&conn));
        let members = entry.members.len();

        if let Some(slow) = deliver_one(&conn, ack.encode()) {
            evictions.push_back((slow, CloseReason::SlowConsumer));
        }
        if !evictions.is_empty() {
            warn!(channel = %name, count = evictions.len(), "Evicting slow consumers on subscribe");
            state.remove_queued(evictions);
        }

        debug!(connection = %id, channel = %name, members, "Subscribed");
        Ok(SubscriptionResult::Subscribed)
    }

    /// Remove `id` from `channel`.
    ///
    /// Leaving a channel the connection is not in is [`HubError::UnknownChannel`].
    pub fn unsubscribe(&self, id: &ConnectionId, channel: &str) -> Result<(), HubError> {
        let mut guard = self.write();
        let state = &mut *guard;
        let member = state
            .connections
            .get_mut(id)
            .ok_or_else(|| HubError::UnknownConnection(id.clone()))?;
        if !member.channels.remove(channel) {
            return Err(HubError::UnknownChannel(channel.to_string()));
        }

        let mut evictions = Evictions::new();
        if let Some(entry) = state.channels.get_mut(channel) {
            entry.members.remove(id);
            if entry.kind == ChannelKind::Presence {
                if let Some(frame) = state.presence.on_leave(channel, id) {
                    let delivery = deliver(entry.members.values(), &frame.encode(), None);
                    queue_slow(&mut evictions, delivery);
                }
            }
            if entry.members.is_empty() {
                state.channels.remove(channel);
                debug!(channel = %channel, "Channel dropped");
            }
        }
        if !evictions.is_empty() {
            state.remove_queued(evictions);
        }

        debug!(connection = %id, channel = %channel, "Unsubscribed");
        Ok(())
    }

    /// Queue `frame` on every member of `channel` except `exclude`.
    ///
    /// Members that cannot take the frame are returned for eviction; the
    /// caller removes them once this read-side pass is over.
    pub fn fan_out(&self, channel: &str, frame: &Frame, exclude: Option<&ConnectionId>) -> Delivery {
        let state = self.read();
        let Some(entry) = state.channels.get(channel) else {
            return Delivery::default();
        };
        let _order = entry.fanout.lock().unwrap_or_else(PoisonError::into_inner);
        deliver(entry.members.values(), frame, exclude)
    }

    /// Unregister every connection, firing presence departures as usual.
    /// New registrations are refused from here on.
    pub fn drain(&self, reason: CloseReason) -> usize {
        let mut state = self.write();
        state.draining = true;
        let queue: Evictions = state
            .connections
            .keys()
            .map(|id| (id.clone(), reason))
            .collect();
        state.remove_queued(queue)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.read().connections.get(id).map(|m| Arc::clone(&m.conn))
    }

    pub fn is_subscribed(&self, id: &ConnectionId, channel: &str) -> bool {
        self.read()
            .connections
            .get(id)
            .is_some_and(|m| m.channels.contains(channel))
    }

    /// Channels `id` is subscribed to, in name order.
    pub fn channels_of(&self, id: &ConnectionId) -> Vec<String> {
        self.read()
            .connections
            .get(id)
            .map(|m| m.channels.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Members of `channel`, in id order.
    pub fn members_of(&self, channel: &str) -> Vec<ConnectionId> {
        self.read()
            .channels
            .get(channel)
            .map(|c| c.members.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Presence roster of `channel`, in join order.
    pub fn current_members(&self, channel: &str) -> Vec<Identity> {
        self.read().presence.current_members(channel)
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    pub fn channel_count(&self) -> usize {
        self.read().channels.len()
    }

    pub fn stats(&self) -> HubStats {
        let state = self.read();
        HubStats {
            connections: state.connections.len(),
            channels: state.channels.len(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryLimits::default())
    }
}
