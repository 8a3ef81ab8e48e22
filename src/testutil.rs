//! Test doubles shared across modules: a spy calendar provider, in-memory
//! stores, and a canned `AppState`.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::config::Config;
use crate::google::{CalendarProvider, NewEvent};
use crate::store::{CredentialStore, WatchChannelStore};
use crate::types::{CalendarEvent, StoredTokens, WatchChannel};

pub fn test_tokens() -> StoredTokens {
    StoredTokens {
        access_token: "test-access".to_string(),
        refresh_token: Some("test-refresh".to_string()),
        expires_at: None,
    }
}

pub fn test_config() -> Config {
    Config {
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: "https://example.com/auth/callback".to_string(),
        webhook_url: Some("https://example.com/webhook".to_string()),
        port: 0,
    }
}

pub fn sample_event() -> CalendarEvent {
    CalendarEvent {
        id: Some("evt-1".to_string()),
        summary: Some("Standup".to_string()),
        ..CalendarEvent::default()
    }
}

/// Provider spy: counts calls, fails on demand.
#[derive(Default)]
pub struct MockProvider {
    pub watch_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub fail_watch: bool,
    pub fail_stop: bool,
    pub fail_list: bool,
}

#[async_trait]
impl CalendarProvider for MockProvider {
    fn auth_url(&self) -> String {
        "https://accounts.example.com/consent".to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<StoredTokens> {
        if code == "bad-code" {
            return Err(anyhow!("invalid_grant"));
        }
        Ok(test_tokens())
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<StoredTokens> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(test_tokens())
    }

    async fn list_events(
        &self,
        _tokens: &StoredTokens,
        _max_results: u32,
    ) -> Result<Vec<CalendarEvent>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(anyhow!("calendar API unavailable"));
        }
        Ok(vec![sample_event()])
    }

    async fn create_event(
        &self,
        _tokens: &StoredTokens,
        event: &NewEvent,
    ) -> Result<CalendarEvent> {
        Ok(CalendarEvent {
            id: Some("created-1".to_string()),
            summary: Some(event.summary.clone()),
            description: event.description.clone(),
            location: event.location.clone(),
            ..CalendarEvent::default()
        })
    }

    async fn watch(
        &self,
        _tokens: &StoredTokens,
        _channel_id: &str,
        _webhook_url: &str,
    ) -> Result<(String, i64)> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_watch {
            return Err(anyhow!("watch registration rejected"));
        }
        Ok(("resource-1".to_string(), 1_900_000_000_000))
    }

    async fn stop(
        &self,
        _tokens: &StoredTokens,
        _channel_id: &str,
        _resource_id: &str,
    ) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(anyhow!("stop rejected"));
        }
        Ok(())
    }
}

/// In-memory replacement for the JSON file store.
#[derive(Default)]
pub struct MemoryStore {
    tokens: Mutex<Option<StoredTokens>>,
    channel: Mutex<Option<WatchChannel>>,
}

impl MemoryStore {
    pub fn with_tokens(tokens: StoredTokens) -> Self {
        let store = Self::default();
        *store.tokens.lock().unwrap() = Some(tokens);
        store
    }

    pub fn set_channel(&self, channel: WatchChannel) {
        *self.channel.lock().unwrap() = Some(channel);
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self) -> Result<Option<StoredTokens>> {
        Ok(self.tokens.lock().unwrap().clone())
    }

    fn put(&self, tokens: StoredTokens) -> Result<()> {
        *self.tokens.lock().unwrap() = Some(tokens);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.tokens.lock().unwrap() = None;
        Ok(())
    }
}

impl WatchChannelStore for MemoryStore {
    fn get(&self) -> Result<Option<WatchChannel>> {
        Ok(self.channel.lock().unwrap().clone())
    }

    fn put(&self, channel: WatchChannel) -> Result<()> {
        *self.channel.lock().unwrap() = Some(channel);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.channel.lock().unwrap() = None;
        Ok(())
    }
}

pub mod state {
    use std::sync::Arc;

    use super::*;
    use crate::state::AppState;

    /// AppState wired to a shared spy provider and in-memory store.
    /// The provider and store are returned so tests can inspect them.
    pub fn with_provider(provider: MockProvider) -> (AppState, Arc<MockProvider>, Arc<MemoryStore>) {
        let provider = Arc::new(provider);
        let store = Arc::new(MemoryStore::with_tokens(test_tokens()));
        let state = AppState::new(
            test_config(),
            provider.clone(),
            store.clone(),
            store.clone(),
        );
        (state, provider, store)
    }

    pub fn authenticated() -> (AppState, Arc<MockProvider>, Arc<MemoryStore>) {
        with_provider(MockProvider::default())
    }

    pub fn unauthenticated() -> AppState {
        let store = Arc::new(MemoryStore::default());
        AppState::new(
            test_config(),
            Arc::new(MockProvider::default()),
            store.clone(),
            store,
        )
    }
}
