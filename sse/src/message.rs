use events::{NotificationKind, UpvoteAction};
use serde::Serialize;
use serde_json::Value;

/// Trait for getting the wire discriminator of a payload
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Payloads broadcast to every connection on the global stream.
///
/// Serialized as a flat JSON object whose `type` field carries the discriminator,
/// e.g. `{"type":"new-post","postId":"p1","post":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum FeedEvent {
    NewPost {
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_id: Option<String>,
        post_id: String,
        post: Value,
    },
    NewComment {
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_id: Option<String>,
        post_id: String,
        parent_id: String,
        post: Value,
    },
    NewReply {
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_id: Option<String>,
        post_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
        reply_to: String,
        post: Value,
    },
    UpdatePost {
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_id: Option<String>,
        post_id: String,
        post: Value,
    },
    UpdateComment {
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_id: Option<String>,
        post_id: String,
        post: Value,
    },
    UpdateReply {
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_id: Option<String>,
        post_id: String,
        post: Value,
    },
    DeletePost {
        id: String,
    },
    DeleteComment {
        id: String,
        parent_id: String,
    },
    DeleteReply {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
        reply_to: String,
    },
    UpdateCommentCount {
        parent_id: String,
        delta: i64,
    },
    DeleteChildren {
        ids: Vec<String>,
    },
    Upvote {
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_id: Option<String>,
        post_id: String,
        user_id: String,
        action: UpvoteAction,
    },
}

impl EventType for FeedEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FeedEvent::NewPost { .. } => "new-post",
            FeedEvent::NewComment { .. } => "new-comment",
            FeedEvent::NewReply { .. } => "new-reply",
            FeedEvent::UpdatePost { .. } => "update-post",
            FeedEvent::UpdateComment { .. } => "update-comment",
            FeedEvent::UpdateReply { .. } => "update-reply",
            FeedEvent::DeletePost { .. } => "delete-post",
            FeedEvent::DeleteComment { .. } => "delete-comment",
            FeedEvent::DeleteReply { .. } => "delete-reply",
            FeedEvent::UpdateCommentCount { .. } => "update-comment-count",
            FeedEvent::DeleteChildren { .. } => "delete-children",
            FeedEvent::Upvote { .. } => "upvote",
        }
    }
}

/// Payload emitted to a single user's connections inside a `notification` frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    pub unread_delta: i64,
}

impl Notification {
    pub fn new(kind: NotificationKind) -> Self {
        Self {
            kind,
            post_id: None,
            actor_id: None,
            unread_delta: 1,
        }
    }

    pub fn post_id(mut self, post_id: impl Into<String>) -> Self {
        self.post_id = Some(post_id.into());
        self
    }

    pub fn actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}
