use crate::connection::{Connection, ConnectionId};
use crate::frame::Frame;
use dashmap::DashMap;
use log::*;

/// Process-wide set of anonymous stream connections.
///
/// Every write failure evicts the failing connection inside the same
/// `broadcast` call, so a dead connection is never written to twice.
pub struct BroadcastRegistry {
    connections: DashMap<ConnectionId, Connection>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Add a connection - no-op if it is already registered
    pub fn register(&self, connection: Connection) {
        self.connections
            .entry(connection.id().clone())
            .or_insert(connection);
    }

    /// Remove a connection - no-op if it is absent
    pub fn unregister(&self, connection_id: &ConnectionId) {
        self.connections.remove(connection_id);
    }

    /// Write a frame to every registered connection - O(n).
    ///
    /// Returns the number of connections the frame was delivered to.
    pub fn broadcast(&self, frame: &Frame) -> usize {
        let mut delivered = 0;

        // Each shard stays write-locked while its members are written to, so
        // concurrent broadcasts reach any one connection in call order.
        self.connections.retain(|connection_id, connection| {
            match connection.write(frame.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    warn!(
                        "Failed to send broadcast to connection {}: {}. Evicting connection.",
                        connection_id, e
                    );
                    connection.close();
                    false
                }
            }
        });

        delivered
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        Self::new()
    }
}
