use crate::transport::{Inbound, Transport};
use futures_util::stream::{BoxStream, StreamExt};
use log::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::task::JoinHandle;

/// A parsed data frame delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Event name; `message` for unnamed frames.
    pub event: String,
    pub data: Value,
}

impl Message {
    /// The `type` discriminator carried in the JSON body, if any.
    pub fn payload_type(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }
}

type Callback = Arc<dyn Fn(&Message) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    callbacks: RwLock<BTreeMap<u64, Callback>>,
}

impl Subscribers {
    fn insert(&self, callback: Callback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, callback);
        id
    }

    fn remove(&self, id: u64) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn len(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn dispatch(&self, event: String, data: &str) {
        let data: Value = match serde_json::from_str(data) {
            Ok(data) => data,
            Err(e) => {
                warn!("Dropping unparseable SSE frame ({event}): {e}");
                return;
            }
        };
        let message = Message { event, data };

        // Snapshot first so callbacks may subscribe or unsubscribe while running.
        let callbacks: Vec<Callback> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for callback in callbacks {
            callback(&message);
        }
    }
}

/// Shares one inbound stream between any number of local subscribers.
///
/// The transport is connected lazily by the first `subscribe` call and then
/// read for the lifetime of the multiplexer. If the inbound stream ever ends,
/// the next `subscribe` connects again. Construct one per stream URL and share
/// it behind an `Arc`; `subscribe` must run inside a tokio runtime.
pub struct Multiplexer {
    transport: Box<dyn Transport>,
    subscribers: Arc<Subscribers>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Multiplexer {
    pub fn new(transport: impl Transport) -> Self {
        Self {
            transport: Box::new(transport),
            subscribers: Arc::new(Subscribers::default()),
            reader: Mutex::new(None),
        }
    }

    /// Registers `callback` for every parsed data frame, in registration order.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let id = self.subscribers.insert(Arc::new(callback));
        self.ensure_connected();

        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
            active: AtomicBool::new(true),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// True while the inbound stream is being read.
    pub fn is_connected(&self) -> bool {
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|reader| !reader.is_finished())
    }

    fn ensure_connected(&self) {
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if reader.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        if reader.is_some() {
            info!("SSE stream had ended; reconnecting");
        }
        let inbound = self.transport.connect();
        *reader = Some(tokio::spawn(read_inbound(
            inbound,
            self.subscribers.clone(),
        )));
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        let reader = self
            .reader
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reader) = reader {
            reader.abort();
        }
    }
}

async fn read_inbound(mut inbound: BoxStream<'static, Inbound>, subscribers: Arc<Subscribers>) {
    while let Some(item) = inbound.next().await {
        match item {
            Inbound::Frame { event, data } => subscribers.dispatch(event, &data),
            Inbound::Comment(comment) => {
                // Handshake and keep-alive comments carry no payload
                trace!("SSE comment: {comment}");
            }
            Inbound::Error(e) => {
                warn!("SSE error: {e}");
            }
        }
    }
    warn!(
        "SSE stream ended; {} subscriber(s) receive nothing until the next subscribe",
        subscribers.len()
    );
}

/// Capability to remove exactly one subscriber.
///
/// Dropping it leaves the subscriber registered; call `unsubscribe`.
pub struct Subscription {
    id: u64,
    subscribers: Weak<Subscribers>,
    active: AtomicBool,
}

impl Subscription {
    /// Removes the subscriber. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
