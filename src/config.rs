//! Server configuration, read from the environment once at boot.
//!
//! Handlers never read env vars directly; everything they need arrives
//! through this struct on `AppState`.

use anyhow::{Context, Result};

pub const DEFAULT_PORT: u16 = 4096;

#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth client id for the Google Cloud project.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Public URL of the `/auth/callback` endpoint, as registered with Google.
    pub redirect_uri: String,
    /// Public URL the provider will POST push notifications to. Optional:
    /// without it the server runs, but watch registration is refused.
    pub webhook_url: Option<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let client_id = require("GOOGLE_CLIENT_ID")?;
        let client_secret = require("GOOGLE_CLIENT_SECRET")?;
        let redirect_uri = require("GOOGLE_REDIRECT_URI")?;

        let webhook_url = std::env::var("WEBHOOK_URL")
            .ok()
            .filter(|v| !v.is_empty());

        let port = match std::env::var("PORT") {
            Ok(v) => v
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", v))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Config {
            client_id,
            client_secret,
            redirect_uri,
            webhook_url,
            port,
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty()).with_context(|| {
        format!(
            "{} is not set.\n\
            Create an OAuth client at https://console.cloud.google.com/apis/credentials\n\
            and export GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET and GOOGLE_REDIRECT_URI.",
            name
        )
    })
}
