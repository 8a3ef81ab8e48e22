//! Shared application state injected into every route handler.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use crate::config::Config;
use crate::error::ApiError;
use crate::google::CalendarProvider;
use crate::hub::Hub;
use crate::store::{CredentialStore, WatchChannelStore};
use crate::types::StoredTokens;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: Hub,
    pub provider: Arc<dyn CalendarProvider>,
    pub credentials: Arc<dyn CredentialStore>,
    pub watch_store: Arc<dyn WatchChannelStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        provider: Arc<dyn CalendarProvider>,
        credentials: Arc<dyn CredentialStore>,
        watch_store: Arc<dyn WatchChannelStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            hub: Hub::new(),
            provider,
            credentials,
            watch_store,
        }
    }

    /// Current valid credential, refreshed through the provider when the
    /// access token has expired and a refresh token is on file.
    pub async fn valid_tokens(&self) -> Result<StoredTokens, ApiError> {
        let tokens = self
            .credentials
            .get()
            .context("Failed to read stored tokens")?
            .ok_or(ApiError::Unauthenticated)?;

        if !tokens.needs_refresh(Utc::now()) {
            return Ok(tokens);
        }

        let Some(refresh_token) = tokens.refresh_token.clone() else {
            return Err(ApiError::Unauthenticated);
        };

        info!("access token expired, refreshing");
        let refreshed = self
            .provider
            .refresh(&refresh_token)
            .await
            .context("Failed to refresh access token")?;

        self.credentials
            .put(refreshed.clone())
            .context("Failed to persist refreshed tokens")?;

        Ok(refreshed)
    }
}
