use anyhow::Result;
use log::*;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stream_client::{EchoCache, EventSourceTransport, Message, Multiplexer, Subscription};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct Event {
    /// The payload's `type` field, falling back to the SSE event name.
    pub event_type: String,
    pub data: Value,
    pub timestamp: Instant,
}

impl From<&Message> for Event {
    fn from(message: &Message) -> Self {
        let event_type = message
            .payload_type()
            .unwrap_or(message.event.as_str())
            .to_string();
        Self {
            event_type,
            data: message.data.clone(),
            timestamp: Instant::now(),
        }
    }
}

pub struct Connection {
    pub user_label: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    subscription: Subscription,
    _multiplexer: Arc<Multiplexer>,
}

impl Connection {
    /// Subscribes to the global feed stream.
    pub fn feed(base_url: &str, user_label: String, echo: Option<Arc<EchoCache>>) -> Self {
        let transport = EventSourceTransport::new(format!("{}/stream", base_url));
        Self::establish(transport, user_label, echo)
    }

    /// Subscribes to the notification stream of `user_id`.
    pub fn notifications(
        base_url: &str,
        user_header: &str,
        user_id: &str,
        user_label: String,
    ) -> Self {
        let transport = EventSourceTransport::new(format!("{}/notifications/stream", base_url))
            .header(user_header, user_id);
        Self::establish(transport, user_label, None)
    }

    fn establish(
        transport: EventSourceTransport,
        user_label: String,
        echo: Option<Arc<EchoCache>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let multiplexer = Arc::new(Multiplexer::new(transport));

        let label = user_label.clone();
        let forward = move |message: &Message| {
            if tx.send(Event::from(message)).is_err() {
                debug!("SSE receiver dropped for {}", label);
            }
        };
        let subscription = match echo {
            Some(cache) => multiplexer.subscribe(cache.suppress(forward)),
            None => multiplexer.subscribe(forward),
        };

        Self {
            user_label,
            event_rx: rx,
            subscription,
            _multiplexer: multiplexer,
        }
    }

    pub async fn wait_for_event(&mut self, event_type: &str, timeout: Duration) -> Result<Event> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!("Timeout waiting for event: {}", event_type);
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if event.event_type == event_type => {
                    return Ok(event);
                }
                Ok(Some(_)) => {
                    // Wrong event type, keep waiting
                    continue;
                }
                Ok(None) => {
                    anyhow::bail!("SSE connection closed");
                }
                Err(_) => {
                    anyhow::bail!("Timeout waiting for event: {}", event_type);
                }
            }
        }
    }

    /// Waits for an event matching `predicate`, returning `None` on timeout.
    pub async fn next_matching<P>(&mut self, timeout: Duration, predicate: P) -> Option<Event>
    where
        P: Fn(&Event) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if predicate(&event) => return Some(event),
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return None,
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
