//! HTTP surface of the realtime platform.
//!
//! Serves the long-lived event streams and the internal endpoint mutation
//! services use to publish domain events.

use log::*;
use tokio::net::TcpListener;

pub use service::AppState;

mod controller;
pub mod error;
mod extractors;
pub mod router;
mod sse;

pub use error::{Error, Result};

pub async fn init_server(app_state: AppState) -> Result<()> {
    let interface = app_state.config.interface().to_string();
    let port = app_state.config.port;
    let listen_addr = format!("{interface}:{port}");

    info!(
        "Server starting... listening for connections on http://{}",
        listen_addr
    );

    let listener = TcpListener::bind(&listen_addr).await?;
    let router = router::define_routes(app_state);

    axum::serve(listener, router).await?;

    Ok(())
}
