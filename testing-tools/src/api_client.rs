use anyhow::{Context, Result};
use events::{DomainEvent, NotificationKind, UpvoteAction};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

const INTERNAL_KEY_HEADER: &str = "x-internal-key";

#[derive(Debug, Deserialize)]
struct PublishResponse {
    status: String,
}

/// Publishes domain events to the server the way a mutation service would.
pub struct ApiClient {
    client: Client,
    base_url: String,
    internal_key: Option<String>,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String, internal_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            internal_key,
        }
    }

    pub async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let url = format!("{}/internal/events", self.base_url);

        let mut request = self.client.post(&url).json(event);
        if let Some(key) = &self.internal_key {
            request = request.header(INTERNAL_KEY_HEADER, key);
        }

        let response = request.send().await.context("Failed to publish event")?;

        if response.status() != StatusCode::ACCEPTED {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("Failed to publish event: {} - Response: {}", status, body);
        }

        let body: PublishResponse = response.json().await.context("Failed to parse response")?;
        log::debug!("Publish acknowledged: {}", body.status);

        Ok(())
    }

    pub async fn create_post(&self, post_id: &str, title: &str, tx_id: Option<&str>) -> Result<()> {
        self.publish(&DomainEvent::PostCreated {
            post_id: post_id.to_string(),
            parent_id: None,
            reply_to: None,
            post: json!({
                "_id": post_id,
                "title": title,
                "content": "Created by stream test tool",
            }),
            tx_id: tx_id.map(str::to_string),
        })
        .await
    }

    pub async fn upvote(&self, post_id: &str, user_id: &str, tx_id: Option<&str>) -> Result<()> {
        self.publish(&DomainEvent::PostUpvoted {
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            action: UpvoteAction::Added,
            tx_id: tx_id.map(str::to_string),
        })
        .await
    }

    pub async fn notify(&self, user_id: &str, kind: NotificationKind, post_id: &str) -> Result<()> {
        self.publish(&DomainEvent::NotificationCreated {
            user_id: user_id.to_string(),
            notification_kind: kind,
            post_id: Some(post_id.to_string()),
            actor_id: None,
            unread_delta: 1,
        })
        .await
    }
}
