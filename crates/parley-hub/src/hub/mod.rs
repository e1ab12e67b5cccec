//! The hub: one cheaply clonable handle over the registry, router and
//! authorizer.
//!
//! Transport sessions and the embedding application both talk to this type.
//! Client requests arrive through [`Hub::handle`]; the application publishes
//! through [`Hub::publish`].

use std::sync::Arc;
use std::time::Duration;

use parley_common::{ConnectionId, HubError, Identity};
use parley_config::ParleyConfig;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::authorizer::{Authorization, Authorizer, PublishPolicy};
use crate::boundary::{self, Boundary};
use crate::channel::ChannelName;
use crate::connection::{CloseReason, Connection, Credentials, Role};
use crate::event::Event;
use crate::protocol::{Frame, Request, ServerFrame};
use crate::registry::{HubStats, Registry, RegistryLimits, SubscriptionResult};
use crate::router::{deliver_one, Router};

struct HubInner {
    registry: Arc<Registry>,
    router: Router,
    authorizer: Authorizer,
    outbound_queue: usize,
    publisher_secret: Option<String>,
}

#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    pub fn new(config: &ParleyConfig, boundary: Arc<dyn Boundary>) -> Self {
        let registry = Arc::new(Registry::new(RegistryLimits {
            max_connections: config.server.max_connections as usize,
            max_channels_per_connection: config.channels.max_channels_per_connection as usize,
        }));
        let authorizer = Authorizer::new(
            boundary,
            Duration::from_millis(u64::from(config.auth.timeout_ms)),
            PublishPolicy::from_config(&config.channels),
        );
        Self {
            inner: Arc::new(HubInner {
                router: Router::new(Arc::clone(&registry)),
                registry,
                authorizer,
                outbound_queue: config.channels.outbound_queue as usize,
                publisher_secret: config.auth.publisher_secret.clone(),
            }),
        }
    }

    /// Build a hub with the boundary selected in `config.auth`.
    pub fn from_config(config: &ParleyConfig) -> Result<Self, HubError> {
        let boundary = boundary::from_config(&config.auth)?;
        Ok(Self::new(config, boundary))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn stats(&self) -> HubStats {
        self.inner.registry.stats()
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.inner.registry.get(id)
    }

    /// Presence roster of `channel`, in join order.
    pub fn current_members(&self, channel: &str) -> Vec<Identity> {
        self.inner.registry.current_members(channel)
    }

    fn role_for(&self, credentials: &Credentials) -> Role {
        match (&self.inner.publisher_secret, &credentials.token) {
            (Some(secret), Some(token)) if secret == token => Role::Publisher,
            _ => Role::Subscriber,
        }
    }

    /// Register a new connection. The receiver yields the frames to write to it,
    /// starting with `connection_established`.
    pub fn connect(
        &self,
        credentials: Credentials,
    ) -> Result<(Arc<Connection>, mpsc::Receiver<Frame>), HubError> {
        let role = self.role_for(&credentials);
        let (conn, rx) = Connection::new(role, credentials, self.inner.outbound_queue);
        self.inner.registry.register(Arc::clone(&conn))?;
        if role == Role::Publisher {
            info!(connection = %conn.id(), "Trusted publisher connected");
        }
        self.send(&conn, ServerFrame::connection_established(conn.id()));
        Ok((conn, rx))
    }

    /// Queue a direct reply, evicting the connection if it cannot take it.
    fn send(&self, conn: &Connection, frame: ServerFrame) {
        if let Some(id) = deliver_one(conn, frame.encode()) {
            warn!(connection = %id, "Reply did not fit in the outbound queue, disconnecting");
            self.inner.registry.unregister(&id, CloseReason::SlowConsumer);
        }
    }

    /// Authorize and subscribe `conn` to `channel`.
    ///
    /// The acknowledgement frame is queued by the registry; on error nothing
    /// is queued and the caller reports the failure.
    pub async fn subscribe(
        &self,
        conn: &Arc<Connection>,
        channel: &str,
    ) -> Result<SubscriptionResult, HubError> {
        let channel = ChannelName::parse(channel)?;
        if self.inner.registry.get(conn.id()).is_none() {
            return Err(HubError::UnknownConnection(conn.id().clone()));
        }

        let identity = match self.inner.authorizer.authorize(conn, &channel).await {
            Authorization::Allow(identity) => identity,
            Authorization::Deny(err) => {
                info!(connection = %conn.id(), channel = %channel, error = %err, "Subscription denied");
                return Err(err);
            }
        };

        // The connection may have gone while the boundary was thinking; the
        // registry re-checks under its lock.
        self.inner.registry.subscribe(conn.id(), &channel, identity)
    }

    /// Leave `channel`. Acknowledged even if `conn` was not a member.
    pub fn unsubscribe(&self, conn: &Arc<Connection>, channel: &str) -> Result<bool, HubError> {
        let was_member = match self.inner.registry.unsubscribe(conn.id(), channel) {
            Ok(()) => true,
            Err(err @ HubError::UnknownChannel(_)) => {
                debug!(connection = %conn.id(), error = %err, "Stale unsubscribe ignored");
                false
            }
            Err(err) => return Err(err),
        };
        self.send(conn, ServerFrame::unsubscribed(channel));
        Ok(was_member)
    }

    /// Publish an application event. Returns how many connections it was handed to.
    ///
    /// This is the back end's entry point; no subscription or policy checks apply.
    pub fn publish(&self, event: Event) -> Result<usize, HubError> {
        ChannelName::parse(&event.channel)?;
        Ok(self.inner.router.publish(&event))
    }

    /// Publish on behalf of a connection.
    ///
    /// Ordinary clients never receive their own publishes. The trusted
    /// publisher chooses whom to exclude.
    pub fn client_publish(
        &self,
        conn: &Arc<Connection>,
        channel: &str,
        event: &str,
        payload: Value,
        exclude: Option<ConnectionId>,
    ) -> Result<usize, HubError> {
        let name = ChannelName::parse(channel)?;
        let subscribed = self.inner.registry.is_subscribed(conn.id(), channel);
        self.inner
            .authorizer
            .authorize_publish(conn, &name, event, subscribed)?;

        let event = Event::new(channel, event, payload);
        let event = match conn.role() {
            Role::Publisher => match exclude {
                Some(id) => event.excluding(id),
                None => event,
            },
            Role::Subscriber => event.excluding(conn.id().clone()),
        };
        Ok(self.inner.router.publish(&event))
    }

    /// Apply one decoded client request.
    pub async fn handle(&self, conn: &Arc<Connection>, request: Request) -> Result<(), HubError> {
        debug!(connection = %conn.id(), ?request, "Request");
        match request {
            Request::Subscribe { channel } => self.subscribe(conn, &channel).await.map(|_| ()),
            Request::Unsubscribe { channel } => self.unsubscribe(conn, &channel).map(|_| ()),
            Request::Publish {
                channel,
                event,
                payload,
                exclude,
            } => self
                .client_publish(conn, &channel, &event, payload, exclude)
                .map(|_| ()),
            Request::ClientEvent {
                channel,
                event,
                payload,
            } => self
                .client_publish(conn, &channel, &event, payload, None)
                .map(|_| ()),
            Request::Ping => {
                self.send(conn, ServerFrame::pong());
                Ok(())
            }
        }
    }

    /// Report a failed request to the client that sent it.
    ///
    /// Subscribe failures become `subscription_error` for that channel;
    /// everything else is a plain `error` frame.
    pub fn reject(&self, conn: &Connection, subscribe_channel: Option<&str>, err: &HubError) {
        let frame = match subscribe_channel {
            Some(channel) => ServerFrame::subscription_error(channel, err),
            None => ServerFrame::error(err),
        };
        self.send(conn, frame);
    }

    /// Unregister a connection. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: &ConnectionId, reason: CloseReason) -> bool {
        self.inner.registry.unregister(id, reason)
    }

    /// Close every connection and refuse new ones.
    pub fn shutdown(&self) -> usize {
        let closed = self.inner.registry.drain(CloseReason::GoingAway);
        info!(closed, "Hub drained");
        closed
    }
}
