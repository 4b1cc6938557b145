use crate::error::Error;
use crate::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use events::DomainEvent;
use log::*;
use serde::Serialize;

/// Header mutation services use to present the shared internal key.
pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub status: String,
}

/// POST /internal/events
///
/// Called by mutation services once their durable write has succeeded. The
/// event is handed to the publisher, which fans it out to live streams.
/// Validates via the internal key when one is configured.
pub async fn publish(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<DomainEvent>,
) -> Result<impl IntoResponse, Error> {
    if let Some(expected_key) = app_state.config.internal_api_key() {
        let provided_key = headers
            .get(INTERNAL_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if provided_key != expected_key {
            warn!("Invalid internal key received on event publish");
            return Err(Error::unauthorized());
        }
    }

    debug!("Publishing domain event: {:?}", event);
    app_state.event_publisher.publish(event).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishResponse {
            status: "accepted".to_string(),
        }),
    ))
}
