use crate::error::Error;
use crate::frame::Frame;
use futures::task::AtomicWaker;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

// Type alias for user IDs (resolved upstream by session handling)
pub type UserId = String;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct Liveness {
    open: AtomicBool,
    // Task reading the frames; woken when the connection closes.
    reader: AtomicWaker,
}

/// Writable handle to one client's outbound frame channel.
///
/// Clones share the same channel and liveness flag. A write fails once the
/// handle is closed or once the reading side (the response body) is dropped.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    sender: UnboundedSender<Frame>,
    liveness: Arc<Liveness>,
}

impl Connection {
    /// Creates a connection and the receiver its frames are read from.
    pub fn new() -> (Self, UnboundedReceiver<Frame>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            id: ConnectionId::new(),
            sender,
            liveness: Arc::new(Liveness {
                open: AtomicBool::new(true),
                reader: AtomicWaker::new(),
            }),
        };
        (connection, receiver)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn is_open(&self) -> bool {
        self.liveness.open.load(Ordering::Acquire) && !self.sender.is_closed()
    }

    /// Queues a frame for delivery. Frames written to one connection are
    /// delivered in the order of the `write` calls.
    pub fn write(&self, frame: Frame) -> Result<(), Error> {
        if !self.liveness.open.load(Ordering::Acquire) {
            return Err(Error::closed());
        }
        self.sender.send(frame).map_err(|_| Error::closed())
    }

    /// Marks the connection closed and wakes its reader. Safe to call any
    /// number of times.
    pub fn close(&self) {
        self.liveness.open.store(false, Ordering::Release);
        self.liveness.reader.wake();
    }

    /// Ready once `close` has been called on any clone of this handle.
    pub fn poll_closed(&self, cx: &mut Context<'_>) -> Poll<()> {
        self.liveness.reader.register(cx.waker());
        if self.liveness.open.load(Ordering::Acquire) {
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }
}
