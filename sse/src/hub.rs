use crate::connection::{Connection, ConnectionId, UserId};
use crate::frame::Frame;
use dashmap::DashMap;
use log::*;
use std::collections::HashMap;

/// Connections keyed by the identity of the user who opened them.
///
/// Dual indices: `users` routes targeted frames, `owners` guarantees each
/// connection sits under exactly one user. No method holds a guard on one
/// index while touching the other.
pub struct NotificationHub {
    /// Routing index: user -> that user's open connections
    users: DashMap<UserId, HashMap<ConnectionId, Connection>>,

    /// Ownership index: connection -> the single user it is keyed under
    owners: DashMap<ConnectionId, UserId>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            owners: DashMap::new(),
        }
    }

    /// Add a connection under `user_id`. A connection already keyed under a
    /// different user is moved, never duplicated.
    pub fn subscribe(&self, user_id: UserId, connection: Connection) {
        let connection_id = connection.id().clone();

        let previous = self.owners.insert(connection_id.clone(), user_id.clone());
        if let Some(previous_user) = previous.filter(|previous| *previous != user_id) {
            debug!(
                "Moving connection {} from user {} to user {}",
                connection_id, previous_user, user_id
            );
            self.remove_from_user(&previous_user, &connection_id);
        }

        self.users
            .entry(user_id)
            .or_default()
            .entry(connection_id)
            .or_insert(connection);
    }

    /// Remove a connection from `user_id`'s set, pruning the set when it empties.
    pub fn unsubscribe(&self, user_id: &UserId, connection_id: &ConnectionId) {
        self.owners
            .remove_if(connection_id, |_, owner| owner == user_id);
        self.remove_from_user(user_id, connection_id);
    }

    /// Write a frame to every connection of `user_id`.
    ///
    /// Unknown or offline users are a silent no-op. Connections whose write
    /// fails are evicted before this returns. Returns the number of deliveries.
    pub fn emit(&self, user_id: &UserId, frame: &Frame) -> usize {
        let mut delivered = 0;
        let mut evicted = Vec::new();

        match self.users.get_mut(user_id) {
            Some(mut connections) => {
                connections.retain(|connection_id, connection| {
                    match connection.write(frame.clone()) {
                        Ok(()) => {
                            delivered += 1;
                            true
                        }
                        Err(e) => {
                            warn!(
                                "Failed to send event to connection {} of user {}: {}. Evicting connection.",
                                connection_id, user_id, e
                            );
                            connection.close();
                            evicted.push(connection_id.clone());
                            false
                        }
                    }
                });
            }
            None => {
                trace!("No open connections for user {user_id}, dropping event");
                return 0;
            }
        }

        if !evicted.is_empty() {
            self.users
                .remove_if(user_id, |_, connections| connections.is_empty());
            for connection_id in &evicted {
                self.owners
                    .remove_if(connection_id, |_, owner| owner == user_id);
            }
        }

        delivered
    }

    /// Ids of the connections currently keyed under `user_id`.
    pub fn connections_for(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.users
            .get(user_id)
            .map(|connections| connections.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn owner_of(&self, connection_id: &ConnectionId) -> Option<UserId> {
        self.owners
            .get(connection_id)
            .map(|owner| owner.value().clone())
    }

    pub fn connection_count(&self) -> usize {
        self.owners.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn remove_from_user(&self, user_id: &UserId, connection_id: &ConnectionId) {
        if let Some(mut connections) = self.users.get_mut(user_id) {
            connections.remove(connection_id);
        }
        self.users
            .remove_if(user_id, |_, connections| connections.is_empty());
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        id.to_string()
    }

    #[test]
    fn test_emit_reaches_all_connections_of_one_user_only() {
        let hub = NotificationHub::new();
        let (c1, mut rx1) = Connection::new();
        let (c2, mut rx2) = Connection::new();
        let (c3, mut rx3) = Connection::new();
        hub.subscribe(user("user-42"), c1);
        hub.subscribe(user("user-42"), c2);
        hub.subscribe(user("user-7"), c3);

        let frame = Frame::notification(r#"{"type":"post_comment","postId":"p1"}"#);
        assert_eq!(hub.emit(&user("user-42"), &frame), 2);

        assert_eq!(rx1.try_recv().unwrap(), frame);
        assert_eq!(rx2.try_recv().unwrap(), frame);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn test_emit_to_unknown_user_is_a_no_op() {
        let hub = NotificationHub::new();
        let (c1, mut rx1) = Connection::new();
        hub.subscribe(user("user-7"), c1);

        assert_eq!(hub.emit(&user("nobody"), &Frame::notification("{}")), 0);
        assert!(rx1.try_recv().is_err());
        assert_eq!(hub.user_count(), 1);
    }

    #[test]
    fn test_unsubscribe_prunes_empty_user_entry() {
        let hub = NotificationHub::new();
        let (c1, _rx1) = Connection::new();
        let id = c1.id().clone();
        hub.subscribe(user("user-42"), c1);
        hub.unsubscribe(&user("user-42"), &id);
        hub.unsubscribe(&user("user-42"), &id);

        assert_eq!(hub.user_count(), 0);
        assert_eq!(hub.connection_count(), 0);
        assert!(hub.owner_of(&id).is_none());
    }

    #[test]
    fn test_subscribe_under_second_user_moves_the_connection() {
        let hub = NotificationHub::new();
        let (c1, mut rx1) = Connection::new();
        let id = c1.id().clone();
        hub.subscribe(user("user-1"), c1.clone());
        hub.subscribe(user("user-2"), c1);

        assert_eq!(hub.owner_of(&id), Some(user("user-2")));
        assert!(hub.connections_for(&user("user-1")).is_empty());
        assert_eq!(hub.connections_for(&user("user-2")), vec![id]);

        assert_eq!(hub.emit(&user("user-1"), &Frame::notification("{}")), 0);
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn test_failed_write_evicts_from_both_indices() {
        let hub = NotificationHub::new();
        let (alive, mut alive_rx) = Connection::new();
        let (dead, dead_rx) = Connection::new();
        let dead_id = dead.id().clone();
        hub.subscribe(user("user-42"), alive);
        hub.subscribe(user("user-42"), dead);
        drop(dead_rx);

        assert_eq!(hub.emit(&user("user-42"), &Frame::notification("{}")), 1);

        assert!(hub.owner_of(&dead_id).is_none());
        assert_eq!(hub.connections_for(&user("user-42")).len(), 1);
        assert!(alive_rx.try_recv().is_ok());
    }

    #[test]
    fn test_last_connection_failing_prunes_user() {
        let hub = NotificationHub::new();
        let (dead, dead_rx) = Connection::new();
        hub.subscribe(user("user-42"), dead);
        drop(dead_rx);

        assert_eq!(hub.emit(&user("user-42"), &Frame::notification("{}")), 0);
        assert_eq!(hub.user_count(), 0);
        assert_eq!(hub.connection_count(), 0);
    }
}
