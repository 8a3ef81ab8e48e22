//! Webhook ingress: provider push notifications.
//!
//! Google interprets any non-2xx response as delivery failure and retries
//! with backoff, so this endpoint acknowledges every call with 200 no matter
//! what breaks downstream. Failures are logged, never surfaced.

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::hub::CALENDAR_UPDATE;
use crate::state::AppState;

/// How many upcoming events to refetch on a change notification.
const RECENT_EVENTS: u32 = 10;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(receive).options(preflight))
}

/// Resource states Google attaches to push notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceState {
    /// Channel establishment confirmation; carries no data change.
    Sync,
    /// The watched resource changed.
    Exists,
    /// The watched resource was deleted.
    NotExists,
    Unknown,
}

impl ResourceState {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("sync") => Self::Sync,
            Some("exists") => Self::Exists,
            Some("not_exists") => Self::NotExists,
            _ => Self::Unknown,
        }
    }
}

/// One inbound push notification, decoded from the x-goog-* headers.
/// Ephemeral: lives for the duration of one request.
#[derive(Debug)]
struct Notification {
    channel_id: Option<String>,
    resource_id: Option<String>,
    state: ResourceState,
    resource_uri: Option<String>,
    message_number: Option<String>,
}

impl Notification {
    fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };

        Self {
            channel_id: get("x-goog-channel-id"),
            resource_id: get("x-goog-resource-id"),
            state: ResourceState::parse(get("x-goog-resource-state").as_deref()),
            resource_uri: get("x-goog-resource-uri"),
            message_number: get("x-goog-message-number"),
        }
    }
}

/// POST /webhook - Accept a provider push notification
async fn receive(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let notification = Notification::from_headers(&headers);

    info!(
        channel_id = notification.channel_id.as_deref().unwrap_or("-"),
        resource_id = notification.resource_id.as_deref().unwrap_or("-"),
        resource_state = ?notification.state,
        resource_uri = notification.resource_uri.as_deref().unwrap_or("-"),
        message_number = notification.message_number.as_deref().unwrap_or("-"),
        "webhook received"
    );

    match process(&state, &notification).await {
        Ok(()) => Json(json!({ "success": true })),
        Err(e) => {
            error!(error = %e, "webhook processing failed");
            Json(json!({ "success": false }))
        }
    }
}

/// OPTIONS /webhook - CORS preflight, answered unconditionally
async fn preflight() -> Json<Value> {
    Json(json!({}))
}

async fn process(state: &AppState, notification: &Notification) -> anyhow::Result<()> {
    // Diagnostics only: an id mismatch usually means a stale channel still
    // registered on the provider side, never a reason to reject delivery.
    if let Ok(Some(stored)) = state.watch_store.get() {
        if notification.channel_id.as_deref() != Some(stored.channel_id.as_str()) {
            warn!(
                notified = notification.channel_id.as_deref().unwrap_or("-"),
                stored = %stored.channel_id,
                "notification for a channel other than the stored one"
            );
        }
    }

    match notification.state {
        ResourceState::Sync => {
            info!("watch channel synchronized");
        }
        ResourceState::Exists => {
            let tokens = state.valid_tokens().await?;
            let events = state.provider.list_events(&tokens, RECENT_EVENTS).await?;

            state.hub.publish(
                CALENDAR_UPDATE,
                json!({
                    "events": events,
                    "receivedAt": Utc::now().to_rfc3339(),
                }),
            );
        }
        ResourceState::NotExists => {
            info!("watched resource deleted");
        }
        ResourceState::Unknown => {
            warn!("unrecognized resource state");
        }
    }

    Ok(())
}
