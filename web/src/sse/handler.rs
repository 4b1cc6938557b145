use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::AppState;
use axum::extract::State;
use axum::response::sse::Sse;
use axum::response::IntoResponse;
use futures::StreamExt;
use log::*;
use sse::stream::{Audience, ConnectionStream};
use std::convert::Infallible;

// Keeps reverse proxies (nginx) from buffering the event stream.
const X_ACCEL_BUFFERING: &str = "x-accel-buffering";

/// Anonymous stream of global broadcasts (new, updated and deleted posts).
pub(crate) async fn stream_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    debug!("Establishing broadcast SSE connection");

    let stream = app_state.stream_endpoint().open(Audience::Broadcast);
    into_response(stream)
}

/// Per-user stream of `notification` events for the authenticated user.
/// A user may hold several of these at once (tabs, devices).
pub(crate) async fn notification_stream_handler(
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    debug!("Establishing notification SSE connection for user {user_id}");

    let stream = app_state.stream_endpoint().open(Audience::User(user_id));
    into_response(stream)
}

// Heartbeats come from the stream itself, so no axum KeepAlive is attached.
// Dropping the body on client disconnect drops the stream and tears it down.
fn into_response(stream: ConnectionStream) -> impl IntoResponse {
    let events = stream.map(|frame| Ok::<_, Infallible>(frame.into_event()));
    ([(X_ACCEL_BUFFERING, "no")], Sse::new(events))
}
