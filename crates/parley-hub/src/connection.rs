//! Per-connection handle shared between the registry and the transport.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parley_common::{ConnectionId, HubError, Identity};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::protocol::Frame;

/// What a connection is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A regular client.
    Subscriber,
    /// The application back end, authenticated with the publisher secret.
    Publisher,
}

/// Handshake credentials handed to the identity boundary.
#[derive(Clone, Default)]
pub struct Credentials {
    pub token: Option<String>,
    pub peer: Option<SocketAddr>,
}

impl Credentials {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            peer: None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("peer", &self.peer)
            .finish()
    }
}

/// Why a connection was closed by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client went away or asked to close.
    Normal,
    /// Hub is shutting down.
    GoingAway,
    /// Client sent a malformed frame.
    Protocol,
    /// Outbound queue overflowed.
    SlowConsumer,
    /// Nothing heard from the client within the idle timeout.
    Idle,
}

impl CloseReason {
    pub fn describe(self) -> &'static str {
        match self {
            CloseReason::Normal => "closed",
            CloseReason::GoingAway => "hub shutting down",
            CloseReason::Protocol => "protocol error",
            CloseReason::SlowConsumer => "too slow to keep up",
            CloseReason::Idle => "idle timeout",
        }
    }
}

/// A live connection.
///
/// The registry owns the membership view; the transport keeps an `Arc` to
/// enqueue frames and to learn when the hub has closed the connection.
pub struct Connection {
    id: ConnectionId,
    role: Role,
    credentials: Credentials,
    identity: OnceLock<Identity>,
    outbound: mpsc::Sender<Frame>,
    cancel: CancellationToken,
    close_reason: OnceLock<CloseReason>,
    connected_at: DateTime<Utc>,
}

impl Connection {
    /// Create a connection with an outbound queue of `capacity` frames.
    pub fn new(
        role: Role,
        credentials: Credentials,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let conn = Arc::new(Self {
            id: ConnectionId::new(),
            role,
            credentials,
            identity: OnceLock::new(),
            outbound,
            cancel: CancellationToken::new(),
            close_reason: OnceLock::new(),
            connected_at: Utc::now(),
        });
        (conn, rx)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// The subscriber identity, once a private or presence subscribe established it.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.get()
    }

    /// Attach `identity` unless one is already set. Returns the identity in effect.
    pub(crate) fn establish_identity(&self, identity: Identity) -> &Identity {
        self.identity.get_or_init(|| identity)
    }

    /// Queue a frame without waiting.
    ///
    /// A full queue is a [`HubError::QueueOverflow`]; a queue whose receiver is
    /// gone means the session already ended.
    pub fn enqueue(&self, frame: Frame) -> Result<(), HubError> {
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(HubError::QueueOverflow(self.id.clone())),
            Err(TrySendError::Closed(_)) => Err(HubError::UnknownConnection(self.id.clone())),
        }
    }

    /// Close the connection. Safe to call any number of times from any task;
    /// the first reason wins.
    pub fn close(&self, reason: CloseReason) {
        let _ = self.close_reason.set(reason);
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Resolves once the connection is closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("identity", &self.identity.get())
            .field("closed", &self.is_closed())
            .finish()
    }
}
