//! Live update stream: one SSE connection per open dashboard tab.
//!
//! Each connection gets a `connected` greeting, then hub publishes
//! interleaved with heartbeats. The hub subscription is owned by the frame
//! stream itself, so a client abort (which drops the response body) tears
//! the registration down exactly once.

use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::HeaderName,
    response::IntoResponse,
    response::sse::{Event, Sse},
    routing::get,
};
use chrono::Utc;
use futures_util::{Stream, StreamExt, stream};
use serde_json::{Value, json};
use tokio_stream::wrappers::IntervalStream;

use crate::hub::{CALENDAR_UPDATE, Hub};
use crate::state::AppState;

/// Keeps intermediary proxies and the browser from timing the stream out.
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(stream_events))
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

fn connected_frame() -> Value {
    json!({ "type": "connected", "timestamp": timestamp() })
}

fn update_frame(data: Value) -> Value {
    json!({ "type": "calendar-update", "data": data, "timestamp": timestamp() })
}

fn heartbeat_frame() -> Value {
    json!({ "type": "heartbeat", "timestamp": timestamp() })
}

/// Frames for one connection. Separate from the HTTP handler so tests can
/// drive it without a transport.
pub fn live_frames(hub: &Hub, heartbeat: Duration) -> impl Stream<Item = Value> + Send + 'static + use<> {
    let subscription = hub.subscribe(CALENDAR_UPDATE);
    let updates = subscription.map(update_frame);

    // First heartbeat one full period after connect, not immediately.
    let start = tokio::time::Instant::now() + heartbeat;
    let heartbeats = IntervalStream::new(tokio::time::interval_at(start, heartbeat))
        .map(|_| heartbeat_frame());

    stream::once(async { connected_frame() }).chain(stream::select(updates, heartbeats))
}

/// GET /events - Long-lived event stream for the dashboard
async fn stream_events(State(state): State<AppState>) -> impl IntoResponse {
    let frames = live_frames(&state.hub, HEARTBEAT_PERIOD)
        .map(|frame| Event::default().json_data(&frame));

    // Tell proxies to leave the stream alone.
    let headers = [
        (HeaderName::from_static("cache-control"), "no-cache, no-transform"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
    ];

    (headers, Sse::new(frames))
}
