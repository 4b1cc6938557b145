use axum::response::sse::Event;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Comment written once when a stream opens, to confirm the transport flows.
pub const HANDSHAKE_COMMENT: &str = "connected";

/// Comment written on every heartbeat tick.
pub const HEARTBEAT_COMMENT: &str = "ping";

/// Event name carried by every per-user notification frame.
pub const NOTIFICATION_EVENT: &str = "notification";

/// One unit of the line-delimited event-stream protocol.
///
/// Data is serialized once by the caller and shared between every connection
/// the frame is written to, so cloning a frame never copies the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `: <text>` - carries no payload, ignored by subscribers.
    Comment(&'static str),
    /// `retry: <millis>` - reconnection delay hint for the client.
    Retry(Duration),
    /// `event: <name>` followed by `data: <json>`.
    Named { event: &'static str, data: Arc<str> },
    /// `data: <json>` with the discriminator inside the JSON body.
    Data(Arc<str>),
}

impl Frame {
    pub fn handshake() -> Self {
        Frame::Comment(HANDSHAKE_COMMENT)
    }

    pub fn heartbeat() -> Self {
        Frame::Comment(HEARTBEAT_COMMENT)
    }

    pub fn notification(data: impl Into<Arc<str>>) -> Self {
        Frame::Named {
            event: NOTIFICATION_EVENT,
            data: data.into(),
        }
    }

    pub fn data(data: impl Into<Arc<str>>) -> Self {
        Frame::Data(data.into())
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Frame::Comment(_))
    }

    /// Converts the frame into the axum representation written to the response body.
    pub fn into_event(self) -> Event {
        match self {
            Frame::Comment(text) => Event::default().comment(text),
            Frame::Retry(delay) => Event::default().retry(delay),
            Frame::Named { event, data } => Event::default().event(event).data(data.as_ref()),
            Frame::Data(data) => Event::default().data(data.as_ref()),
        }
    }
}

/// Formats the frame exactly as it appears on the wire, blank-line terminated.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Frame::Comment(text) => write!(f, ": {text}\n\n"),
            Frame::Retry(delay) => write!(f, "retry: {}\n\n", delay.as_millis()),
            Frame::Named { event, data } => write!(f, "event: {event}\ndata: {data}\n\n"),
            Frame::Data(data) => write!(f, "data: {data}\n\n"),
        }
    }
}
