//! Shared domain types: stored credentials, watch channels, calendar events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OAuth tokens persisted between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredTokens {
    /// Whether the access token should be refreshed before use.
    /// A small skew margin avoids racing the expiry on the wire.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now + Duration::seconds(60) >= at,
            None => false,
        }
    }
}

/// One active provider-side push subscription.
///
/// A stored channel whose expiration has passed is logically dead even
/// though it is still on disk; readers must re-check liveness every time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchChannel {
    pub channel_id: String,
    pub resource_id: String,
    /// Absolute expiry instant, epoch milliseconds (provider wire format).
    pub expiration: i64,
}

impl WatchChannel {
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expiration < now_millis
    }
}

/// Start or end of an event: a timed instant or an all-day date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// A calendar event as the provider returns it. Only the fields the
/// dashboard renders are kept; everything else is dropped on decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}
