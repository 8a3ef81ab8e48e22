//! Calendar event endpoints: list upcoming and create, always against the
//! operator's primary calendar.

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::google::NewEvent;
use crate::state::AppState;
use crate::types::CalendarEvent;

const DEFAULT_MAX_RESULTS: u32 = 10;

pub fn router() -> Router<AppState> {
    Router::new().route("/calendar/events", get(list_events).post(create_event))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    max_results: Option<u32>,
}

#[derive(Serialize)]
struct EventsResponse {
    success: bool,
    count: usize,
    events: Vec<CalendarEvent>,
}

/// GET /calendar/events - Upcoming events, ordered by start time
async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<EventsResponse>, ApiError> {
    let tokens = state.valid_tokens().await?;

    let events = state
        .provider
        .list_events(&tokens, params.max_results.unwrap_or(DEFAULT_MAX_RESULTS))
        .await
        .context("Failed to fetch calendar events")?;

    Ok(Json(EventsResponse {
        success: true,
        count: events.len(),
        events,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventRequest {
    summary: String,
    description: Option<String>,
    location: Option<String>,
    start_date_time: String,
    end_date_time: String,
}

#[derive(Serialize)]
struct CreateEventResponse {
    success: bool,
    event: CalendarEvent,
}

/// POST /calendar/events - Create a new event
async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<Json<CreateEventResponse>, ApiError> {
    let tokens = state.valid_tokens().await?;

    let event = state
        .provider
        .create_event(
            &tokens,
            &NewEvent {
                summary: req.summary,
                description: req.description,
                location: req.location,
                start_date_time: req.start_date_time,
                end_date_time: req.end_date_time,
            },
        )
        .await
        .context("Failed to create event")?;

    Ok(Json(CreateEventResponse {
        success: true,
        event,
    }))
}
