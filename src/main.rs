use events::EventPublisher;
use log::*;
use service::{config::Config, logging::Logger, AppState};
use sse::domain_event_handler::SseDomainEventHandler;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!("Starting realtime platform...");

    // One Manager per process; everything that delivers events shares it.
    let sse_manager = Arc::new(sse::Manager::new());
    let event_publisher = EventPublisher::new()
        .with_handler(Arc::new(SseDomainEventHandler::new(sse_manager.clone())));

    info!(
        "Streams configured: heartbeat every {:?}, client retry {:?}",
        config.heartbeat_interval(),
        config.client_retry()
    );

    let app_state = AppState::new(config, &sse_manager, event_publisher);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server failed: {e}");
        std::process::exit(1);
    }
}
