use anyhow::Result;
use async_stream::stream;
use eventsource_client::{self as es, Client};
use futures_util::stream::{BoxStream, StreamExt};
use log::*;
use std::time::Duration;

/// Default delay before the transport reconnects after losing the stream.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// One item read off the inbound event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A data frame; `event` is `message` for unnamed frames.
    Frame { event: String, data: String },
    /// A comment frame such as the handshake or a heartbeat.
    Comment(String),
    /// A transport-level failure. The transport may keep going afterwards.
    Error(String),
}

/// Source of the single inbound stream a `Multiplexer` reads.
pub trait Transport: Send + Sync + 'static {
    fn connect(&self) -> BoxStream<'static, Inbound>;
}

/// `eventsource-client` backed transport with automatic reconnection.
#[derive(Debug, Clone)]
pub struct EventSourceTransport {
    url: String,
    headers: Vec<(String, String)>,
    reconnect_delay: Duration,
}

impl EventSourceTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    fn build_client(&self) -> Result<impl Client> {
        let mut builder = es::ClientBuilder::for_url(&self.url)?;
        for (name, value) in &self.headers {
            builder = builder.header(name, value)?;
        }

        let reconnect = es::ReconnectOptions::reconnect(true)
            .retry_initial(true)
            .delay(self.reconnect_delay)
            .build();

        Ok(builder.reconnect(reconnect).build())
    }
}

impl Transport for EventSourceTransport {
    fn connect(&self) -> BoxStream<'static, Inbound> {
        let client = self.build_client();
        let url = self.url.clone();

        stream! {
            let client = match client {
                Ok(client) => client,
                Err(e) => {
                    yield Inbound::Error(format!("Invalid SSE client configuration: {e}"));
                    return;
                }
            };
            debug!("Opening SSE stream to {}", url);

            let mut events = client.stream();
            while let Some(item) = events.next().await {
                match item {
                    Ok(es::SSE::Event(event)) => {
                        yield Inbound::Frame {
                            event: event.event_type,
                            data: event.data,
                        };
                    }
                    Ok(es::SSE::Comment(comment)) => {
                        yield Inbound::Comment(comment);
                    }
                    Err(e) => {
                        yield Inbound::Error(e.to_string());
                    }
                }
            }
        }
        .boxed()
    }
}
