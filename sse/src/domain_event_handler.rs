use crate::message::{FeedEvent, Notification};
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Handles domain events by converting them to stream payloads.
///
/// Post mutations become global broadcasts; notifications are emitted to the
/// receiving user's connections only. A single mutation may fan out into
/// several payloads (e.g. a new comment also bumps its parent's comment count).
pub struct SseDomainEventHandler {
    sse_manager: Arc<Manager>,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }
}

/// Maps a post mutation to the broadcast payloads it produces, in delivery order.
pub fn feed_events(event: &DomainEvent) -> Vec<FeedEvent> {
    match event {
        DomainEvent::PostCreated {
            post_id,
            parent_id,
            reply_to,
            post,
            tx_id,
        } => {
            let created = match (reply_to, parent_id) {
                (Some(reply_to), parent_id) => FeedEvent::NewReply {
                    tx_id: tx_id.clone(),
                    post_id: post_id.clone(),
                    parent_id: parent_id.clone(),
                    reply_to: reply_to.clone(),
                    post: post.clone(),
                },
                (None, Some(parent_id)) => FeedEvent::NewComment {
                    tx_id: tx_id.clone(),
                    post_id: post_id.clone(),
                    parent_id: parent_id.clone(),
                    post: post.clone(),
                },
                (None, None) => FeedEvent::NewPost {
                    tx_id: tx_id.clone(),
                    post_id: post_id.clone(),
                    post: post.clone(),
                },
            };

            let mut events = vec![created];
            if let Some(parent_id) = parent_id {
                events.push(FeedEvent::UpdateCommentCount {
                    parent_id: parent_id.clone(),
                    delta: 1,
                });
            }
            events
        }

        DomainEvent::PostUpdated {
            post_id,
            parent_id,
            reply_to,
            post,
            tx_id,
        } => {
            let tx_id = tx_id.clone();
            let post_id = post_id.clone();
            let post = post.clone();
            let updated = if reply_to.is_some() {
                FeedEvent::UpdateReply {
                    tx_id,
                    post_id,
                    post,
                }
            } else if parent_id.is_some() {
                FeedEvent::UpdateComment {
                    tx_id,
                    post_id,
                    post,
                }
            } else {
                FeedEvent::UpdatePost {
                    tx_id,
                    post_id,
                    post,
                }
            };
            vec![updated]
        }

        DomainEvent::PostDeleted {
            post_id,
            parent_id,
            reply_to,
            child_ids,
        } => {
            let deleted = match (reply_to, parent_id) {
                (Some(reply_to), parent_id) => FeedEvent::DeleteReply {
                    id: post_id.clone(),
                    parent_id: parent_id.clone(),
                    reply_to: reply_to.clone(),
                },
                (None, Some(parent_id)) => FeedEvent::DeleteComment {
                    id: post_id.clone(),
                    parent_id: parent_id.clone(),
                },
                (None, None) => FeedEvent::DeletePost {
                    id: post_id.clone(),
                },
            };

            let mut events = vec![deleted];
            if let Some(parent_id) = parent_id {
                events.push(FeedEvent::UpdateCommentCount {
                    parent_id: parent_id.clone(),
                    delta: -1,
                });
            }
            if !child_ids.is_empty() {
                events.push(FeedEvent::DeleteChildren {
                    ids: child_ids.clone(),
                });
            }
            events
        }

        DomainEvent::PostUpvoted {
            post_id,
            user_id,
            action,
            tx_id,
        } => vec![FeedEvent::Upvote {
            tx_id: tx_id.clone(),
            post_id: post_id.clone(),
            user_id: user_id.clone(),
            action: *action,
        }],

        DomainEvent::NotificationCreated { .. } => Vec::new(),
    }
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::NotificationCreated {
                user_id,
                notification_kind,
                post_id,
                actor_id,
                unread_delta,
            } => {
                debug!("Handling NotificationCreated event for user {user_id}");

                let notification = Notification {
                    kind: *notification_kind,
                    post_id: post_id.clone(),
                    actor_id: actor_id.clone(),
                    unread_delta: *unread_delta,
                };
                self.sse_manager.emit(user_id, &notification);
            }
            _ => {
                for feed_event in feed_events(event) {
                    self.sse_manager.broadcast(&feed_event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::frame::Frame;
    use crate::message::EventType;
    use events::{NotificationKind, UpvoteAction};
    use serde_json::{json, Value};

    fn types(events: &[FeedEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.event_type()).collect()
    }

    fn created(parent_id: Option<&str>, reply_to: Option<&str>) -> DomainEvent {
        DomainEvent::PostCreated {
            post_id: "p2".to_string(),
            parent_id: parent_id.map(str::to_string),
            reply_to: reply_to.map(str::to_string),
            post: json!({"_id": "p2"}),
            tx_id: Some("tx-1".to_string()),
        }
    }

    #[test]
    fn test_top_level_post_creates_single_new_post() {
        assert_eq!(types(&feed_events(&created(None, None))), vec!["new-post"]);
    }

    #[test]
    fn test_comment_also_bumps_parent_count() {
        let events = feed_events(&created(Some("p1"), None));
        assert_eq!(types(&events), vec!["new-comment", "update-comment-count"]);
        assert_eq!(
            events[1],
            FeedEvent::UpdateCommentCount {
                parent_id: "p1".to_string(),
                delta: 1
            }
        );
    }

    #[test]
    fn test_reply_takes_precedence_over_comment() {
        let events = feed_events(&created(Some("p1"), Some("c1")));
        assert_eq!(types(&events), vec!["new-reply", "update-comment-count"]);
    }

    #[test]
    fn test_update_kind_follows_document_position() {
        let update = |parent_id: Option<&str>, reply_to: Option<&str>| DomainEvent::PostUpdated {
            post_id: "p2".to_string(),
            parent_id: parent_id.map(str::to_string),
            reply_to: reply_to.map(str::to_string),
            post: json!({}),
            tx_id: None,
        };
        assert_eq!(types(&feed_events(&update(None, None))), vec!["update-post"]);
        assert_eq!(
            types(&feed_events(&update(Some("p1"), None))),
            vec!["update-comment"]
        );
        assert_eq!(
            types(&feed_events(&update(Some("p1"), Some("c1")))),
            vec!["update-reply"]
        );
    }

    #[test]
    fn test_delete_cascades_children_and_decrements_count() {
        let events = feed_events(&DomainEvent::PostDeleted {
            post_id: "c1".to_string(),
            parent_id: Some("p1".to_string()),
            reply_to: None,
            child_ids: vec!["r1".to_string(), "r2".to_string()],
        });
        assert_eq!(
            types(&events),
            vec!["delete-comment", "update-comment-count", "delete-children"]
        );
        assert_eq!(
            events[2],
            FeedEvent::DeleteChildren {
                ids: vec!["r1".to_string(), "r2".to_string()]
            }
        );
    }

    #[test]
    fn test_notification_produces_no_broadcast() {
        let event = DomainEvent::NotificationCreated {
            user_id: "user-42".to_string(),
            notification_kind: NotificationKind::Mention,
            post_id: None,
            actor_id: None,
            unread_delta: 1,
        };
        assert!(feed_events(&event).is_empty());
    }

    #[tokio::test]
    async fn test_handler_broadcasts_post_events_in_order() {
        let manager = Arc::new(Manager::new());
        let (connection, mut rx) = Connection::new();
        manager.register_connection(connection);
        let handler = SseDomainEventHandler::new(manager.clone());

        handler.handle(&created(Some("p1"), None)).await;

        let mut received = Vec::new();
        while let Ok(Frame::Data(data)) = rx.try_recv() {
            let value: Value = serde_json::from_str(&data).unwrap();
            received.push(value["type"].as_str().unwrap().to_string());
        }
        assert_eq!(received, vec!["new-comment", "update-comment-count"]);
    }

    #[tokio::test]
    async fn test_handler_emits_notifications_to_receiver_only() {
        let manager = Arc::new(Manager::new());
        let (receiver, mut receiver_rx) = Connection::new();
        let (other, mut other_rx) = Connection::new();
        let (anonymous, mut anonymous_rx) = Connection::new();
        manager.subscribe_user("user-42".to_string(), receiver);
        manager.subscribe_user("user-7".to_string(), other);
        manager.register_connection(anonymous);
        let handler = SseDomainEventHandler::new(manager.clone());

        handler
            .handle(&DomainEvent::NotificationCreated {
                user_id: "user-42".to_string(),
                notification_kind: NotificationKind::PostLike,
                post_id: Some("p1".to_string()),
                actor_id: Some("user-7".to_string()),
                unread_delta: 1,
            })
            .await;

        match receiver_rx.try_recv().unwrap() {
            Frame::Named { event, data } => {
                assert_eq!(event, "notification");
                let value: Value = serde_json::from_str(&data).unwrap();
                assert_eq!(value["type"], "post_like");
                assert_eq!(value["actorId"], "user-7");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
        assert!(other_rx.try_recv().is_err());
        assert!(anonymous_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handler_broadcasts_upvote() {
        let manager = Arc::new(Manager::new());
        let (connection, mut rx) = Connection::new();
        manager.register_connection(connection);
        let handler = SseDomainEventHandler::new(manager);

        handler
            .handle(&DomainEvent::PostUpvoted {
                post_id: "p1".to_string(),
                user_id: "u1".to_string(),
                action: UpvoteAction::Added,
                tx_id: Some("tx-9".to_string()),
            })
            .await;

        match rx.try_recv().unwrap() {
            Frame::Data(data) => {
                let value: Value = serde_json::from_str(&data).unwrap();
                assert_eq!(value["type"], "upvote");
                assert_eq!(value["txId"], "tx-9");
                assert_eq!(value["action"], "added");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
