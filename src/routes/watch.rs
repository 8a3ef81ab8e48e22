//! Watch channel endpoints: start, stop, and inspect the provider-side push
//! subscription.

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    routing::post,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;
use crate::watch::{self, WatchStatus};

pub fn router() -> Router<AppState> {
    Router::new().route("/calendar/watch", post(start).delete(stop).get(status))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    success: bool,
    channel_id: String,
    resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<DateTime<Utc>>,
}

/// POST /calendar/watch - Register a new push channel
async fn start(State(state): State<AppState>) -> Result<Json<StartResponse>, ApiError> {
    let tokens = state.valid_tokens().await?;

    let channel = watch::start_watch(
        state.provider.as_ref(),
        state.watch_store.as_ref(),
        &tokens,
        state.config.webhook_url.as_deref(),
    )
    .await?;

    Ok(Json(StartResponse {
        success: true,
        expiration: DateTime::from_timestamp_millis(channel.expiration),
        channel_id: channel.channel_id,
        resource_id: channel.resource_id,
    }))
}

#[derive(Serialize)]
struct StopResponse {
    success: bool,
    message: String,
}

/// DELETE /calendar/watch - Stop the active push channel
async fn stop(State(state): State<AppState>) -> Result<Json<StopResponse>, ApiError> {
    let tokens = state.valid_tokens().await?;

    watch::stop_watch(state.provider.as_ref(), state.watch_store.as_ref(), &tokens).await?;

    Ok(Json(StopResponse {
        success: true,
        message: "Watch channel stopped".to_string(),
    }))
}

/// GET /calendar/watch - Liveness of the stored channel
///
/// Needs no credential: it is a pure function of local state and the clock.
async fn status(State(state): State<AppState>) -> Result<Json<WatchStatus>, ApiError> {
    let channel = state
        .watch_store
        .get()
        .context("Failed to read watch channel")?;

    Ok(Json(watch::status(channel, Utc::now().timestamp_millis())))
}
