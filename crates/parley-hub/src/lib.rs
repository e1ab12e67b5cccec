//! Parley: a real-time publish/subscribe hub.
//!
//! Clients hold WebSocket connections and subscribe to named channels; the
//! application publishes events that the hub fans out to every subscriber.
//!
//! ```text
//! client ──ws──► transport::session ──Request──► Hub ──► Authorizer ──► Boundary
//!                      ▲                          │
//!                      │                          ├──► Registry (+ PresenceTracker)
//!                      └──── outbound queue ◄─────┴──► Router
//! ```
//!
//! Channels come in three kinds, chosen by name prefix: public (no prefix),
//! `private-` (identity and access check required) and `presence-` (as
//! private, plus a roster of who is there).

pub mod authorizer;
pub mod boundary;
pub mod channel;
pub mod connection;
pub mod event;
pub mod hub;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod transport;

pub use authorizer::{Authorization, Authorizer, PublishPolicy};
pub use boundary::{Boundary, DenyAllBoundary, HttpBoundary, StaticBoundary};
pub use channel::ChannelName;
pub use connection::{CloseReason, Connection, Credentials, Role};
pub use event::Event;
pub use hub::Hub;
pub use protocol::{Frame, Request, ServerFrame};
pub use registry::{HubStats, Registry, RegistryLimits, SubscriptionResult};
pub use router::{Delivery, Router};
pub use transport::{Listener, TransportSettings};
