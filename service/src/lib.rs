use config::Config;
use events::EventPublisher;
use sse::stream::StreamEndpoint;
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state shared by every request handler.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sse_manager: Arc<sse::Manager>,
    pub event_publisher: EventPublisher,
}

impl AppState {
    pub fn new(
        app_config: Config,
        sse_manager: &Arc<sse::Manager>,
        event_publisher: EventPublisher,
    ) -> Self {
        Self {
            config: app_config,
            sse_manager: Arc::clone(sse_manager),
            event_publisher,
        }
    }

    /// Stream endpoint configured with this process's heartbeat and retry settings.
    pub fn stream_endpoint(&self) -> StreamEndpoint {
        let endpoint = StreamEndpoint::new(
            Arc::clone(&self.sse_manager),
            self.config.heartbeat_interval(),
        );
        match self.config.client_retry() {
            Some(retry) => endpoint.with_retry(retry),
            None => endpoint,
        }
    }
}
