//! Delivery of server events to individual connections.

use crate::protocol::ServerEvent;
use crate::session::ConnectionId;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, instrument, warn};

/// Unicast delivery to a single connection.
///
/// Implementations must not block: the coordinator calls this while holding
/// a session lock.
pub trait Outbox: Send + Sync {
    /// Queues `event` for `to`. Unknown or closed connections are ignored.
    fn send(&self, to: &ConnectionId, event: ServerEvent);
}

/// Registry of live connections, each fed by an unbounded channel.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    senders: Mutex<HashMap<ConnectionId, UnboundedSender<ServerEvent>>>,
}

impl ConnectionHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns the receiving end of its queue.
    #[instrument(skip(self))]
    pub fn register(&self, connection: ConnectionId) -> UnboundedReceiver<ServerEvent> {
        let (tx, rx) = unbounded_channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection, tx);
        debug!("Connection registered");
        rx
    }

    /// Drops a connection's queue.
    #[instrument(skip(self))]
    pub fn unregister(&self, connection: &ConnectionId) {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection);
        debug!("Connection unregistered");
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Outbox for ConnectionHub {
    fn send(&self, to: &ConnectionId, event: ServerEvent) {
        let senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        match senders.get(to) {
            Some(tx) => {
                if tx.send(event).is_err() {
                    warn!(connection_id = %to, "Connection queue closed, event dropped");
                }
            }
            None => debug!(connection_id = %to, "No such connection, event dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_reaches_only_target() {
        let hub = ConnectionHub::new();
        let mut a = hub.register("a".into());
        let mut b = hub.register("b".into());

        hub.send(&"a".into(), ServerEvent::error("hi"));

        assert_eq!(a.try_recv().unwrap(), ServerEvent::error("hi"));
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn test_unregistered_connection_is_ignored() {
        let hub = ConnectionHub::new();
        let _rx = hub.register("a".into());
        hub.unregister(&"a".into());
        hub.send(&"a".into(), ServerEvent::error("lost"));
        assert!(hub.is_empty());
    }
}
