//! Per-connection lifecycle of a streaming endpoint.
//!
//! `CONNECTING -> OPEN -> CLOSED`. Opening a stream registers a fresh
//! connection, writes the handshake comment and starts the heartbeat. Every
//! exit path (client disconnect, explicit close, failed heartbeat write)
//! converges on one idempotent teardown that stops the heartbeat, unregisters
//! the connection and closes it.

use crate::connection::{Connection, ConnectionId, UserId};
use crate::frame::Frame;
use crate::Manager;
use futures::Stream;
use log::*;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Default period between keep-alive comments.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Which registry a stream's connection is held by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Anonymous consumer of global broadcasts.
    Broadcast,
    /// Authenticated consumer of one user's notifications.
    User(UserId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

/// Opens streaming connections against a shared `Manager`.
#[derive(Clone)]
pub struct StreamEndpoint {
    manager: Arc<Manager>,
    heartbeat_interval: Duration,
    retry: Option<Duration>,
}

impl StreamEndpoint {
    pub fn new(manager: Arc<Manager>, heartbeat_interval: Duration) -> Self {
        Self {
            manager,
            heartbeat_interval: heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL),
            retry: None,
        }
    }

    /// Sends a `retry:` reconnection hint right after the handshake.
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Accept a new client. Must be called from within a tokio runtime.
    pub fn open(&self, audience: Audience) -> ConnectionStream {
        let (connection, receiver) = Connection::new();
        let lifecycle = Arc::new(Lifecycle {
            connection: connection.clone(),
            audience: audience.clone(),
            manager: self.manager.clone(),
            heartbeat: Mutex::new(None),
            state: AtomicU8::new(ConnectionState::Connecting as u8),
        });

        match audience {
            Audience::Broadcast => self.manager.register_connection(connection.clone()),
            Audience::User(user_id) => self.manager.subscribe_user(user_id, connection.clone()),
        }

        // The receiver is held right here, so these writes cannot fail.
        let _ = connection.write(Frame::handshake());
        if let Some(retry) = self.retry {
            let _ = connection.write(Frame::Retry(retry));
        }

        let heartbeat = tokio::spawn(run_heartbeat(
            connection,
            lifecycle.clone(),
            self.heartbeat_interval,
        ));
        lifecycle.start(heartbeat);

        ConnectionStream {
            receiver,
            lifecycle,
        }
    }
}

struct Lifecycle {
    connection: Connection,
    audience: Audience,
    manager: Arc<Manager>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    state: AtomicU8,
}

impl Lifecycle {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn start(&self, heartbeat: JoinHandle<()>) {
        let mut slot = self.heartbeat.lock().unwrap_or_else(|e| e.into_inner());
        let opened = self
            .state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if opened {
            *slot = Some(heartbeat);
            info!("SSE connection {} open", self.connection.id());
        } else {
            // Torn down before the heartbeat was handed over.
            heartbeat.abort();
        }
    }

    fn heartbeat_active(&self) -> bool {
        self.heartbeat
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop heartbeat, unregister, close. Every call after the first is a no-op.
    fn teardown(&self) {
        let previous = self
            .state
            .swap(ConnectionState::Closed as u8, Ordering::AcqRel);
        if previous == ConnectionState::Closed as u8 {
            return;
        }

        let heartbeat = self
            .heartbeat
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = heartbeat {
            handle.abort();
        }

        let connection_id = self.connection.id();
        match &self.audience {
            Audience::Broadcast => self.manager.unregister_connection(connection_id),
            Audience::User(user_id) => self.manager.unsubscribe_user(user_id, connection_id),
        }
        self.connection.close();

        info!("SSE connection {connection_id} closed");
    }
}

async fn run_heartbeat(connection: Connection, lifecycle: Arc<Lifecycle>, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = connection.write(Frame::heartbeat()) {
            debug!(
                "Heartbeat to connection {} failed: {}. Tearing down.",
                connection.id(),
                e
            );
            lifecycle.teardown();
            break;
        }
        trace!("Heartbeat sent to connection {}", connection.id());
    }
}

/// The outbound side of one open stream, consumed by the HTTP response body.
///
/// Dropping it (the client went away) runs the teardown sequence.
pub struct ConnectionStream {
    receiver: UnboundedReceiver<Frame>,
    lifecycle: Arc<Lifecycle>,
}

impl ConnectionStream {
    pub fn id(&self) -> &ConnectionId {
        self.lifecycle.connection.id()
    }

    pub fn audience(&self) -> &Audience {
        &self.lifecycle.audience
    }

    pub fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    pub fn heartbeat_active(&self) -> bool {
        self.lifecycle.heartbeat_active()
    }

    /// Close the stream from the server side. Frames still queued are discarded.
    pub fn close(&mut self) {
        self.lifecycle.teardown();
        self.receiver.close();
    }
}

impl Stream for ConnectionStream {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        // Teardown and registry eviction both close the connection, which
        // wakes this task so the response body ends right away.
        if self.lifecycle.connection.poll_closed(cx).is_ready() {
            self.lifecycle.teardown();
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ConnectionStream {
    fn drop(&mut self) {
        self.lifecycle.teardown();
    }
}
