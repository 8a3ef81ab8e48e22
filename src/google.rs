//! Google Calendar REST client and the provider seam it implements.
//!
//! Everything the server needs from Google goes through `CalendarProvider`
//! so tests can substitute a spy. The real client talks to the Calendar v3
//! API and the OAuth token endpoint over reqwest.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::types::{CalendarEvent, StoredTokens};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/calendar.events",
];

/// Request body for creating an event on the primary calendar.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date_time: String,
    pub end_date_time: String,
}

/// The external calendar collaborator.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Consent URL the browser is redirected to for the OAuth flow.
    fn auth_url(&self) -> String;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<StoredTokens>;

    /// Mint a fresh access token from a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<StoredTokens>;

    /// Upcoming events on the primary calendar, ordered by start time.
    async fn list_events(
        &self,
        tokens: &StoredTokens,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>>;

    async fn create_event(&self, tokens: &StoredTokens, event: &NewEvent)
    -> Result<CalendarEvent>;

    /// Register a push channel for the primary calendar's events.
    /// Returns the provider-assigned resource id and the expiration instant
    /// in epoch milliseconds.
    async fn watch(
        &self,
        tokens: &StoredTokens,
        channel_id: &str,
        webhook_url: &str,
    ) -> Result<(String, i64)>;

    /// Stop a push channel. A channel the provider no longer knows about
    /// counts as stopped: local and remote state may have diverged.
    async fn stop(&self, tokens: &StoredTokens, channel_id: &str, resource_id: &str)
    -> Result<()>;
}

pub struct GoogleCalendar {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleCalendar {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    /// Google omits the refresh token on refresh grants; carry the old one
    /// forward so the credential stays renewable.
    fn into_tokens(self, previous_refresh: Option<String>) -> StoredTokens {
        StoredTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: self.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
        }
    }
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatchResponse {
    resource_id: String,
    /// Epoch milliseconds, string-encoded on the wire.
    expiration: String,
}

/// Turn a non-2xx response into an error carrying status and body.
async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("{} failed with {}: {}", what, status, body))
}

#[async_trait]
impl CalendarProvider for GoogleCalendar {
    fn auth_url(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .finish();

        format!("{}?{}", AUTH_ENDPOINT, query)
    }

    async fn exchange_code(&self, code: &str) -> Result<StoredTokens> {
        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("redirect_uri", &self.redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("Failed to reach token endpoint")?;

        let tokens: TokenResponse = check(response, "Code exchange")
            .await?
            .json()
            .await
            .context("Failed to parse token response")?;

        Ok(tokens.into_tokens(None))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredTokens> {
        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("Failed to reach token endpoint")?;

        let tokens: TokenResponse = check(response, "Token refresh")
            .await?
            .json()
            .await
            .context("Failed to parse token response")?;

        Ok(tokens.into_tokens(Some(refresh_token.to_string())))
    }

    async fn list_events(
        &self,
        tokens: &StoredTokens,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>> {
        let response = self
            .http
            .get(format!("{}/calendars/primary/events", CALENDAR_API))
            .bearer_auth(&tokens.access_token)
            .query(&[
                ("timeMin", Utc::now().to_rfc3339()),
                ("maxResults", max_results.to_string()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await
            .context("Failed to reach calendar API")?;

        let list: EventList = check(response, "Event listing")
            .await?
            .json()
            .await
            .context("Failed to parse event list")?;

        Ok(list.items)
    }

    async fn create_event(
        &self,
        tokens: &StoredTokens,
        event: &NewEvent,
    ) -> Result<CalendarEvent> {
        let body = json!({
            "summary": event.summary,
            "description": event.description,
            "location": event.location,
            "start": { "dateTime": event.start_date_time },
            "end": { "dateTime": event.end_date_time },
        });

        let response = self
            .http
            .post(format!("{}/calendars/primary/events", CALENDAR_API))
            .bearer_auth(&tokens.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to reach calendar API")?;

        check(response, "Event creation")
            .await?
            .json()
            .await
            .context("Failed to parse created event")
    }

    async fn watch(
        &self,
        tokens: &StoredTokens,
        channel_id: &str,
        webhook_url: &str,
    ) -> Result<(String, i64)> {
        let body = json!({
            "id": channel_id,
            "type": "web_hook",
            "address": webhook_url,
        });

        let response = self
            .http
            .post(format!("{}/calendars/primary/events/watch", CALENDAR_API))
            .bearer_auth(&tokens.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to reach calendar API")?;

        let watch: WatchResponse = check(response, "Watch registration")
            .await?
            .json()
            .await
            .context("Failed to parse watch response")?;

        let expiration = watch
            .expiration
            .parse::<i64>()
            .with_context(|| format!("Invalid watch expiration: {}", watch.expiration))?;

        Ok((watch.resource_id, expiration))
    }

    async fn stop(
        &self,
        tokens: &StoredTokens,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<()> {
        let body = json!({
            "id": channel_id,
            "resourceId": resource_id,
        });

        let response = self
            .http
            .post(format!("{}/channels/stop", CALENDAR_API))
            .bearer_auth(&tokens.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to reach calendar API")?;

        // 404 means the channel is already gone; that is the state we want.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }

        check(response, "Watch stop").await?;
        Ok(())
    }
}
