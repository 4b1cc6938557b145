use crate::multiplexer::Message;
use dashmap::DashMap;
use log::*;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How long a self-originated operation id is remembered.
pub const DEFAULT_ECHO_WINDOW: Duration = Duration::from_secs(6);

/// Field in a broadcast payload carrying the originating operation id.
pub const TX_ID_FIELD: &str = "txId";

/// Generates an operation id to attach to a self-originated mutation.
pub fn new_tx_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Short-lived set of operation ids this client produced itself.
///
/// Lets a subscriber skip the echo of a change it already applied
/// optimistically. Entries expire on their own after the window; an echo that
/// arrives later is simply applied again.
pub struct EchoCache {
    window: Duration,
    entries: DashMap<String, Instant>,
}

impl EchoCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    /// Marks `id` as produced just now. Empty ids are ignored.
    pub fn remember(&self, id: &str) {
        if id.is_empty() {
            return;
        }
        self.entries
            .retain(|_, remembered_at| remembered_at.elapsed() < self.window);
        self.entries.insert(id.to_string(), Instant::now());
    }

    /// True iff `id` was remembered and has not expired yet.
    pub fn seen(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }

        let fresh = match self.entries.get(id) {
            Some(remembered_at) => remembered_at.elapsed() < self.window,
            None => return false,
        };
        if !fresh {
            self.entries
                .remove_if(id, |_, remembered_at| remembered_at.elapsed() >= self.window);
        }
        fresh
    }

    /// Wraps a subscriber so messages echoing one of our own operations are skipped.
    pub fn suppress<F>(self: &Arc<Self>, callback: F) -> impl Fn(&Message) + Send + Sync + 'static
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let cache = Arc::clone(self);
        move |message: &Message| {
            let tx_id = message.data.get(TX_ID_FIELD).and_then(Value::as_str);
            if let Some(tx_id) = tx_id.filter(|tx_id| cache.seen(tx_id)) {
                debug!("Skipping echo of own operation {tx_id}");
                return;
            }
            callback(message);
        }
    }
}

impl Default for EchoCache {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn message(data: Value) -> Message {
        Message {
            event: "message".to_string(),
            data,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_remembered_id_is_seen_until_window_elapses() {
        let cache = EchoCache::default();
        cache.remember("tx-1");
        assert!(cache.seen("tx-1"));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cache.seen("tx-1"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.seen("tx-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_and_empty_ids_are_never_seen() {
        let cache = EchoCache::default();
        cache.remember("");
        assert!(!cache.seen(""));
        assert!(!cache.seen("never-remembered"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remember_refreshes_expiry() {
        let cache = EchoCache::new(Duration::from_secs(2));
        cache.remember("tx-1");
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.remember("tx-1");
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.seen("tx-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppress_drops_own_echo_and_passes_others() {
        let cache = Arc::new(EchoCache::default());
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();
        let subscriber = cache.suppress(move |message: &Message| {
            sink.lock().unwrap().push(message.data["postId"].clone());
        });

        let tx_id = new_tx_id();
        cache.remember(&tx_id);

        subscriber(&message(json!({"type": "upvote", "txId": tx_id, "postId": "mine"})));
        subscriber(&message(json!({"type": "upvote", "txId": "someone-else", "postId": "theirs"})));
        subscriber(&message(json!({"type": "new-post", "postId": "no-tx"})));

        assert_eq!(*delivered.lock().unwrap(), vec![json!("theirs"), json!("no-tx")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_echo_is_applied_again() {
        let cache = Arc::new(EchoCache::default());
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        let subscriber = cache.suppress(move |_: &Message| {
            *counter.lock().unwrap() += 1;
        });

        cache.remember("tx-1");
        tokio::time::advance(DEFAULT_ECHO_WINDOW).await;
        subscriber(&message(json!({"type": "update-post", "txId": "tx-1"})));

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_tx_ids_are_unique() {
        assert_ne!(new_tx_id(), new_tx_id());
    }
}
