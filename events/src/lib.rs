//! Event system infrastructure for the realtime platform.
//!
//! This crate provides the event system that decouples mutation handlers
//! (post create/update/delete, notification creation) from the live delivery
//! layer (SSE fan-out).
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing every mutation that has live subscribers
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! A mutation handler publishes exactly one event per logical mutation, and only
//! after its own durable write has succeeded. Delivery is best-effort: handlers
//! never report failures back to the publisher.
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies. Document data is carried as serialized JSON values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Identifier of a stored document or user, as issued by the document store.
pub type Id = String;

/// Direction of an upvote toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpvoteAction {
    Added,
    Removed,
}

/// Category of a per-user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PostLike,
    PostComment,
    Comment,
    Mention,
    Follow,
    System,
}

/// Domain events that represent completed mutations in the system.
///
/// Posts, comments and replies share one document shape; the position of a
/// document in the thread is derived from `parent_id` (comment on a post) and
/// `reply_to` (reply to a comment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A post, comment or reply was inserted.
    PostCreated {
        post_id: Id,
        #[serde(default)]
        parent_id: Option<Id>,
        #[serde(default)]
        reply_to: Option<Id>,
        /// Complete enriched document as stored, including author fields.
        post: Value,
        /// Client-generated operation id, echoed back for echo suppression.
        #[serde(default)]
        tx_id: Option<String>,
    },
    /// A post, comment or reply was edited.
    PostUpdated {
        post_id: Id,
        #[serde(default)]
        parent_id: Option<Id>,
        #[serde(default)]
        reply_to: Option<Id>,
        post: Value,
        #[serde(default)]
        tx_id: Option<String>,
    },
    /// A post, comment or reply was removed along with its descendants.
    PostDeleted {
        post_id: Id,
        #[serde(default)]
        parent_id: Option<Id>,
        #[serde(default)]
        reply_to: Option<Id>,
        /// Ids of the cascaded children removed in the same mutation.
        #[serde(default)]
        child_ids: Vec<Id>,
    },
    /// A user toggled their upvote on a post.
    PostUpvoted {
        post_id: Id,
        user_id: Id,
        action: UpvoteAction,
        #[serde(default)]
        tx_id: Option<String>,
    },
    /// A notification was stored for `user_id` (the receiver).
    NotificationCreated {
        user_id: Id,
        notification_kind: NotificationKind,
        #[serde(default)]
        post_id: Option<Id>,
        #[serde(default)]
        actor_id: Option<Id>,
        #[serde(default = "default_unread_delta")]
        unread_delta: i64,
    },
}

fn default_unread_delta() -> i64 {
    1
}

/// Trait for handling domain events.
/// Implementations perform side effects like pushing live updates.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder {
        label: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &DomainEvent) {
            let kind = match event {
                DomainEvent::PostCreated { .. } => "created",
                DomainEvent::PostUpdated { .. } => "updated",
                DomainEvent::PostDeleted { .. } => "deleted",
                DomainEvent::PostUpvoted { .. } => "upvoted",
                DomainEvent::NotificationCreated { .. } => "notification",
            };
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, kind));
        }
    }

    #[tokio::test]
    async fn test_publish_calls_handlers_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let publisher = EventPublisher::new()
            .with_handler(Arc::new(Recorder {
                label: "first",
                seen: seen.clone(),
            }))
            .with_handler(Arc::new(Recorder {
                label: "second",
                seen: seen.clone(),
            }));

        publisher
            .publish(DomainEvent::PostDeleted {
                post_id: "p1".to_string(),
                parent_id: None,
                reply_to: None,
                child_ids: vec![],
            })
            .await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:deleted".to_string(), "second:deleted".to_string()]
        );
    }

    #[tokio::test]
    async fn test_publish_without_handlers_is_a_no_op() {
        let publisher = EventPublisher::default();
        assert_eq!(publisher.handler_count(), 0);
        publisher
            .publish(DomainEvent::PostUpvoted {
                post_id: "p1".to_string(),
                user_id: "u1".to_string(),
                action: UpvoteAction::Added,
                tx_id: None,
            })
            .await;
    }

    #[test]
    fn test_deserialize_notification_defaults_unread_delta() {
        let event: DomainEvent = serde_json::from_value(json!({
            "kind": "notification_created",
            "user_id": "user-42",
            "notification_kind": "post_comment",
            "post_id": "p1"
        }))
        .unwrap();

        assert_eq!(
            event,
            DomainEvent::NotificationCreated {
                user_id: "user-42".to_string(),
                notification_kind: NotificationKind::PostComment,
                post_id: Some("p1".to_string()),
                actor_id: None,
                unread_delta: 1,
            }
        );
    }

    #[test]
    fn test_deserialize_post_created_with_optional_fields_missing() {
        let event: DomainEvent = serde_json::from_value(json!({
            "kind": "post_created",
            "post_id": "p1",
            "post": {"_id": "p1", "title": "hello"}
        }))
        .unwrap();

        match event {
            DomainEvent::PostCreated {
                parent_id,
                reply_to,
                tx_id,
                ..
            } => {
                assert!(parent_id.is_none());
                assert!(reply_to.is_none());
                assert!(tx_id.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
