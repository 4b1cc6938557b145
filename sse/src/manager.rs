use crate::broadcast::BroadcastRegistry;
use crate::connection::{Connection, ConnectionId, UserId};
use crate::error::Error;
use crate::frame::Frame;
use crate::hub::NotificationHub;
use crate::message::{EventType, FeedEvent, Notification};
use log::*;
use serde::Serialize;

/// Owns the process-local Broadcast Registry and User Notification Hub.
///
/// Construct once at startup and share it behind an `Arc`; this is the only
/// way the rest of the system reaches the membership sets.
pub struct Manager {
    registry: BroadcastRegistry,
    hub: NotificationHub,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            registry: BroadcastRegistry::new(),
            hub: NotificationHub::new(),
        }
    }

    /// Register an anonymous connection for global broadcasts
    pub fn register_connection(&self, connection: Connection) {
        debug!("Registering broadcast connection {}", connection.id());
        self.registry.register(connection);
    }

    /// Unregister an anonymous connection
    pub fn unregister_connection(&self, connection_id: &ConnectionId) {
        debug!("Unregistering broadcast connection {connection_id}");
        self.registry.unregister(connection_id);
    }

    /// Register a connection owned by an authenticated user
    pub fn subscribe_user(&self, user_id: UserId, connection: Connection) {
        debug!(
            "Subscribing connection {} for user {}",
            connection.id(),
            user_id
        );
        self.hub.subscribe(user_id, connection);
    }

    /// Unregister a user-owned connection
    pub fn unsubscribe_user(&self, user_id: &UserId, connection_id: &ConnectionId) {
        debug!("Unsubscribing connection {connection_id} for user {user_id}");
        self.hub.unsubscribe(user_id, connection_id);
    }

    /// Serialize the event once and deliver it to every broadcast connection.
    pub fn broadcast(&self, event: &FeedEvent) {
        let data = match to_json(event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize SSE event: {e} ({:?})", e.source);
                return;
            }
        };

        let delivered = self.registry.broadcast(&Frame::data(data));
        debug!(
            "Broadcast {} event to {} connection(s)",
            event.event_type(),
            delivered
        );
    }

    /// Serialize the notification once and deliver it to `user_id`'s connections only.
    pub fn emit(&self, user_id: &UserId, notification: &Notification) {
        let data = match to_json(notification) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize SSE notification: {e} ({:?})", e.source);
                return;
            }
        };

        let delivered = self.hub.emit(user_id, &Frame::notification(data));
        debug!("Emitted notification to {delivered} connection(s) of user {user_id}");
    }

    pub fn broadcast_connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn user_connection_count(&self) -> usize {
        self.hub.connection_count()
    }

    pub fn is_registered(&self, connection_id: &ConnectionId) -> bool {
        self.registry.contains(connection_id) || self.hub.owner_of(connection_id).is_some()
    }
}

fn to_json<T: Serialize>(payload: &T) -> Result<String, Error> {
    Ok(serde_json::to_string(payload)?)
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::NotificationKind;
    use serde_json::{json, Value};

    fn parse(frame: Frame) -> Value {
        match frame {
            Frame::Data(data) | Frame::Named { data, .. } => serde_json::from_str(&data).unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_broadcast_delivers_new_post_to_every_connection() {
        let manager = Manager::new();
        let (a, mut rx_a) = Connection::new();
        let (b, mut rx_b) = Connection::new();
        manager.register_connection(a);
        manager.register_connection(b);

        let post = json!({"_id": "p1", "title": "Hello"});
        manager.broadcast(&FeedEvent::NewPost {
            tx_id: None,
            post_id: "p1".to_string(),
            post: post.clone(),
        });

        for rx in [&mut rx_a, &mut rx_b] {
            let frame = rx.try_recv().unwrap();
            assert!(matches!(frame, Frame::Data(_)));
            let value = parse(frame);
            assert_eq!(value["type"], "new-post");
            assert_eq!(value["post"], post);
        }
    }

    #[test]
    fn test_broadcast_does_not_reach_user_connections() {
        let manager = Manager::new();
        let (c, mut rx) = Connection::new();
        manager.subscribe_user("user-42".to_string(), c);

        manager.broadcast(&FeedEvent::DeletePost {
            id: "p1".to_string(),
        });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_wraps_payload_in_notification_frame() {
        let manager = Manager::new();
        let (c1, mut rx1) = Connection::new();
        let (c2, mut rx2) = Connection::new();
        let (c3, mut rx3) = Connection::new();
        manager.subscribe_user("user-42".to_string(), c1);
        manager.subscribe_user("user-42".to_string(), c2);
        manager.subscribe_user("user-7".to_string(), c3);

        manager.emit(
            &"user-42".to_string(),
            &Notification::new(NotificationKind::PostComment).post_id("p1"),
        );

        for rx in [&mut rx1, &mut rx2] {
            let frame = rx.try_recv().unwrap();
            assert!(matches!(
                frame,
                Frame::Named {
                    event: "notification",
                    ..
                }
            ));
            let value = parse(frame);
            assert_eq!(value["type"], "post_comment");
            assert_eq!(value["postId"], "p1");
            assert!(rx.try_recv().is_err());
        }
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn test_unregister_and_unsubscribe() {
        let manager = Manager::new();
        let (a, _rx_a) = Connection::new();
        let (b, _rx_b) = Connection::new();
        let a_id = a.id().clone();
        let b_id = b.id().clone();
        manager.register_connection(a);
        manager.subscribe_user("user-1".to_string(), b);
        assert!(manager.is_registered(&a_id));
        assert!(manager.is_registered(&b_id));

        manager.unregister_connection(&a_id);
        manager.unsubscribe_user(&"user-1".to_string(), &b_id);

        assert!(!manager.is_registered(&a_id));
        assert!(!manager.is_registered(&b_id));
        assert_eq!(manager.broadcast_connection_count(), 0);
        assert_eq!(manager.user_connection_count(), 0);
    }

    #[test]
    fn test_unserializable_payload_maps_to_serialization_error() {
        use crate::error::ErrorKind;
        use std::collections::HashMap;

        let payload: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);
        let err = to_json(&payload).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Serialization);
        assert!(err.source.is_some());
    }
}
