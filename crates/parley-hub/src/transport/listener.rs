//! TCP accept loop with graceful drain.

use std::net::SocketAddr;
use std::time::Duration;

use parley_common::HubError;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::{handshake, session, TransportSettings};
use crate::hub::Hub;

/// Consecutive accept failures after which the listener gives up.
pub const MAX_CONSECUTIVE_ACCEPT_ERRORS: u32 = 32;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Listener {
    listener: TcpListener,
    hub: Hub,
    settings: TransportSettings,
}

impl Listener {
    pub async fn bind(addr: &str, hub: Hub, settings: TransportSettings) -> Result<Self, HubError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            hub,
            settings,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HubError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept sessions until `shutdown` fires, then drain the hub.
    ///
    /// Returns [`HubError::Accept`] if the socket keeps failing to accept.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), HubError> {
        let Self {
            listener,
            hub,
            settings,
        } = self;
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "Listening");
        }

        let sessions = TaskTracker::new();
        let mut failures = 0u32;

        let result = loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    failures = 0;
                    let hub = hub.clone();
                    let settings = settings.clone();
                    sessions.spawn(async move {
                        match handshake::accept(stream, peer, &settings).await {
                            Ok((ws, credentials)) => {
                                session::run(hub, ws, peer, credentials, settings).await
                            }
                            Err(e) => debug!(peer = %peer, error = %e, "Handshake failed"),
                        }
                    });
                }
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, failures, "TCP accept error");
                    if failures >= MAX_CONSECUTIVE_ACCEPT_ERRORS {
                        error!("Giving up after {failures} consecutive accept errors");
                        break Err(HubError::Accept(e.to_string()));
                    }
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        };

        drop(listener);
        let closed = hub.shutdown();
        sessions.close();
        info!(closed, open_sessions = sessions.len(), "Draining sessions");
        if tokio::time::timeout(settings.shutdown_grace, sessions.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = sessions.len(),
                "Sessions still open after the grace period"
            );
        }
        info!("Listener stopped");
        result
    }
}
