//! Channel authorizer: decides whether a connection may join or publish to
//! a channel.
//!
//! Boundary calls happen here, before the registry lock is taken, and each
//! one is bounded by `auth.timeout_ms`. A boundary that errors or times out
//! is a denial.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parley_common::{ChannelKind, HubError, Identity};
use parley_config::ChannelsConfig;
use tracing::{debug, warn};

use crate::boundary::Boundary;
use crate::channel::ChannelName;
use crate::connection::{Connection, Role};
use crate::protocol::CLIENT_EVENT_PREFIX;

/// Outcome of a subscribe authorization.
#[derive(Debug)]
pub enum Authorization {
    /// Carries the subscriber identity for private and presence channels.
    Allow(Option<Identity>),
    Deny(HubError),
}

/// Which channel kinds accept publishes from ordinary clients.
#[derive(Debug, Clone, Default)]
pub struct PublishPolicy {
    pub client_events: Vec<ChannelKind>,
    pub client_publish: Vec<ChannelKind>,
}

impl PublishPolicy {
    pub fn from_config(channels: &ChannelsConfig) -> Self {
        Self {
            client_events: channels.client_events.clone(),
            client_publish: channels.client_publish.clone(),
        }
    }
}

pub struct Authorizer {
    boundary: Arc<dyn Boundary>,
    timeout: Duration,
    policy: PublishPolicy,
}

impl Authorizer {
    pub fn new(boundary: Arc<dyn Boundary>, timeout: Duration, policy: PublishPolicy) -> Self {
        Self {
            boundary,
            timeout,
            policy,
        }
    }

    /// Run a boundary call under the configured timeout.
    async fn bounded<T>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T, HubError>>,
    ) -> Result<T, HubError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(HubError::BoundaryUnavailable(format!(
                "{what} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// The connection's identity: the established one, or a fresh boundary
    /// lookup. A looked-up identity sticks only once a channel grants access.
    async fn identity_of(&self, conn: &Connection) -> Result<Option<Identity>, HubError> {
        if let Some(identity) = conn.identity() {
            return Ok(Some(identity.clone()));
        }
        self.bounded("identity lookup", self.boundary.resolve_identity(conn))
            .await
    }

    /// Decide whether `conn` may subscribe to `channel`.
    pub async fn authorize(&self, conn: &Connection, channel: &ChannelName) -> Authorization {
        if channel.kind() == ChannelKind::Public {
            return Authorization::Allow(None);
        }

        let identity = match self.identity_of(conn).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                return Authorization::Deny(HubError::denied(
                    channel.as_str(),
                    "no subscriber identity",
                ))
            }
            Err(e) => {
                warn!(connection = %conn.id(), channel = %channel, error = %e, "Identity boundary failed, denying");
                return Authorization::Deny(e);
            }
        };

        let access = self
            .bounded(
                "access check",
                self.boundary.check_channel_access(&identity, channel),
            )
            .await;
        match access {
            Ok(true) => {
                let identity = conn.establish_identity(identity).clone();
                debug!(connection = %conn.id(), channel = %channel, identity = %identity.display_id(), "Authorized");
                Authorization::Allow(Some(identity))
            }
            Ok(false) => Authorization::Deny(HubError::denied(channel.as_str(), "access refused")),
            Err(e) => {
                warn!(connection = %conn.id(), channel = %channel, error = %e, "Access boundary failed, denying");
                Authorization::Deny(e)
            }
        }
    }

    /// Decide whether `conn` may publish `event` on `channel`.
    ///
    /// The trusted publisher may publish anywhere. Everyone else must be
    /// subscribed, and the channel kind must be open to that sort of event.
    pub fn authorize_publish(
        &self,
        conn: &Connection,
        channel: &ChannelName,
        event: &str,
        subscribed: bool,
    ) -> Result<(), HubError> {
        if conn.role() == Role::Publisher {
            return Ok(());
        }
        if !subscribed {
            return Err(HubError::denied(
                channel.as_str(),
                "publishing requires a subscription",
            ));
        }
        let kind = channel.kind();
        let (allowed, what) = if event.starts_with(CLIENT_EVENT_PREFIX) {
            (&self.policy.client_events, "client events")
        } else {
            (&self.policy.client_publish, "client publishes")
        };
        if allowed.contains(&kind) {
            Ok(())
        } else {
            Err(HubError::denied(
                channel.as_str(),
                format!("{what} are not enabled on {kind} channels"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{DenyAllBoundary, StaticBoundary};
    use crate::connection::Credentials;
    use async_trait::async_trait;
    use parley_config::TokenGrant;

    struct SlowBoundary;

    #[async_trait]
    impl Boundary for SlowBoundary {
        async fn resolve_identity(&self, _c: &Connection) -> Result<Option<Identity>, HubError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Some(Identity::new(1)))
        }

        async fn check_channel_access(
            &self,
            _i: &Identity,
            _c: &ChannelName,
        ) -> Result<bool, HubError> {
            Ok(true)
        }
    }

    fn authorizer(boundary: Arc<dyn Boundary>) -> Authorizer {
        Authorizer::new(
            boundary,
            Duration::from_millis(50),
            PublishPolicy::from_config(&ChannelsConfig::default()),
        )
    }

    fn static_boundary() -> Arc<dyn Boundary> {
        Arc::new(StaticBoundary::from_grants(&[TokenGrant {
            token: "ann".into(),
            identity: Identity::new(1).with_info("name", "Ann"),
            channels: vec!["presence-room.*".into()],
        }]))
    }

    fn conn(token: Option<&str>, role: Role) -> Arc<Connection> {
        let credentials = token.map(Credentials::with_token).unwrap_or_default();
        Connection::new(role, credentials, 1).0
    }

    fn channel(name: &str) -> ChannelName {
        ChannelName::parse(name).unwrap()
    }

    #[tokio::test]
    async fn public_channels_need_nothing() {
        let auth = authorizer(Arc::new(DenyAllBoundary));
        let anon = conn(None, Role::Subscriber);
        assert!(matches!(
            auth.authorize(&anon, &channel("public.chat")).await,
            Authorization::Allow(None)
        ));
    }

    #[tokio::test]
    async fn presence_allow_carries_identity_and_caches_it() {
        let auth = authorizer(static_boundary());
        let ann = conn(Some("ann"), Role::Subscriber);
        match auth.authorize(&ann, &channel("presence-room.1")).await {
            Authorization::Allow(Some(identity)) => assert_eq!(identity.info["name"], "Ann"),
            other => panic!("expected allow, got {other:?}"),
        }
        assert_eq!(ann.identity().map(|i| i.display_id()), Some("1".to_string()));
    }

    #[tokio::test]
    async fn private_denied_without_identity_or_grant() {
        let auth = authorizer(static_boundary());
        let anon = conn(None, Role::Subscriber);
        assert!(matches!(
            auth.authorize(&anon, &channel("private-chat.1")).await,
            Authorization::Deny(HubError::AuthorizationDenied { .. })
        ));

        let ann = conn(Some("ann"), Role::Subscriber);
        assert!(matches!(
            auth.authorize(&ann, &channel("private-chat.1")).await,
            Authorization::Deny(HubError::AuthorizationDenied { .. })
        ));
        assert!(ann.identity().is_none());

        assert!(matches!(
            auth.authorize(&ann, &channel("presence-room.1")).await,
            Authorization::Allow(Some(_))
        ));
        assert!(ann.identity().is_some());
    }

    #[tokio::test]
    async fn slow_boundary_fails_closed() {
        let auth = authorizer(Arc::new(SlowBoundary));
        let ann = conn(Some("ann"), Role::Subscriber);
        assert!(matches!(
            auth.authorize(&ann, &channel("presence-room.1")).await,
            Authorization::Deny(HubError::BoundaryUnavailable(_))
        ));
        assert!(ann.identity().is_none());
    }

    #[test]
    fn publish_policy() {
        let auth = authorizer(Arc::new(DenyAllBoundary));
        let client = conn(None, Role::Subscriber);

        // Must be subscribed.
        assert!(auth
            .authorize_publish(&client, &channel("private-a"), "client-typing", false)
            .is_err());
        // client-* allowed on private/presence by default.
        assert!(auth
            .authorize_publish(&client, &channel("private-a"), "client-typing", true)
            .is_ok());
        assert!(auth
            .authorize_publish(&client, &channel("public.chat"), "client-typing", true)
            .is_err());
        // Plain publishes are closed by default.
        assert!(auth
            .authorize_publish(&client, &channel("public.chat"), "MessageSent", true)
            .is_err());

        let backend = conn(Some("secret"), Role::Publisher);
        assert!(auth
            .authorize_publish(&backend, &channel("public.chat"), "MessageSent", false)
            .is_ok());
    }

    #[test]
    fn open_client_publish_by_config() {
        let channels = ChannelsConfig {
            client_publish: vec![ChannelKind::Public],
            ..ChannelsConfig::default()
        };
        let auth = Authorizer::new(
            Arc::new(DenyAllBoundary),
            Duration::from_millis(50),
            PublishPolicy::from_config(&channels),
        );
        let client = conn(None, Role::Subscriber);
        assert!(auth
            .authorize_publish(&client, &channel("public.chat"), "MessageSent", true)
            .is_ok());
    }
}
