//! Broadcast router: fans a published event out to a channel's members.
//!
//! ```text
//! publish(event)
//!     ↓
//! Registry::fan_out (read lock + per-channel order lock)
//!     ↓
//! deliver → try_send on each member's bounded queue
//!     ↓
//! overflowed members → Registry::unregister_all (write lock, after fan-out)
//! ```

use std::sync::Arc;

use parley_common::{ConnectionId, HubError};
use tracing::{debug, warn};

use crate::connection::{CloseReason, Connection};
use crate::event::Event;
use crate::protocol::Frame;
use crate::registry::Registry;

/// Result of handing a frame to a set of connections.
#[derive(Debug, Default)]
pub struct Delivery {
    /// Connections the frame was queued on.
    pub delivered: usize,
    /// Connections whose queue was full or already gone.
    pub evict: Vec<ConnectionId>,
}

/// Queue `frame` on every target except `exclude`. Never blocks.
pub(crate) fn deliver<'a>(
    targets: impl IntoIterator<Item = &'a Arc<Connection>>,
    frame: &Frame,
    exclude: Option<&ConnectionId>,
) -> Delivery {
    let mut delivery = Delivery::default();
    for conn in targets {
        if Some(conn.id()) == exclude {
            continue;
        }
        match conn.enqueue(Arc::clone(frame)) {
            Ok(()) => delivery.delivered += 1,
            Err(_) => delivery.evict.push(conn.id().clone()),
        }
    }
    delivery
}

/// Queue `frame` on one connection, reporting it for eviction on failure.
pub(crate) fn deliver_one(conn: &Connection, frame: Frame) -> Option<ConnectionId> {
    conn.enqueue(frame).err().map(|_| conn.id().clone())
}

pub struct Router {
    registry: Arc<Registry>,
}

impl Router {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Publish an event. Returns how many connections it was handed to.
    ///
    /// Publishes on the same channel are delivered to every member in the
    /// order this method accepted them.
    pub fn publish(&self, event: &Event) -> usize {
        let frame = event.frame();
        let delivery = self
            .registry
            .fan_out(&event.channel, &frame, event.exclude.as_ref());

        if !delivery.evict.is_empty() {
            for id in &delivery.evict {
                let err = HubError::QueueOverflow(id.clone());
                warn!(connection = %id, channel = %event.channel, "{err}, disconnecting");
            }
            self.registry
                .unregister_all(delivery.evict, CloseReason::SlowConsumer);
        }

        debug!(
            channel = %event.channel,
            event = %event.name,
            delivered = delivery.delivered,
            "Published"
        );
        delivery.delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Credentials, Role};

    fn conn(capacity: usize) -> (Arc<Connection>, tokio::sync::mpsc::Receiver<Frame>) {
        Connection::new(Role::Subscriber, Credentials::default(), capacity)
    }

    #[test]
    fn deliver_skips_excluded() {
        let (a, mut a_rx) = conn(4);
        let (b, mut b_rx) = conn(4);
        let frame = Frame::from("x");

        let delivery = deliver([&a, &b], &frame, Some(a.id()));
        assert_eq!(delivery.delivered, 1);
        assert!(delivery.evict.is_empty());
        assert!(a_rx.try_recv().is_err());
        assert_eq!(&*b_rx.try_recv().unwrap(), "x");
    }

    #[test]
    fn deliver_reports_full_queues() {
        let (a, _a_rx) = conn(1);
        let (b, _b_rx) = conn(4);
        let frame = Frame::from("x");

        deliver([&a], &frame, None);
        let delivery = deliver([&a, &b], &frame, None);
        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.evict, vec![a.id().clone()]);
    }

    #[test]
    fn deliver_one_reports_dead_receiver() {
        let (a, rx) = conn(1);
        drop(rx);
        assert_eq!(deliver_one(&a, Frame::from("x")), Some(a.id().clone()));
    }
}
