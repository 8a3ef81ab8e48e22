//! Watch channel lifecycle: registration, teardown, and liveness.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::google::CalendarProvider;
use crate::store::WatchChannelStore;
use crate::types::{StoredTokens, WatchChannel};

/// Snapshot of the watch channel state at one instant.
///
/// "No channel at all" and "channel on file but expired" are distinct so the
/// dashboard can decide whether a restart is needed; `expired` is omitted
/// entirely when no channel exists.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStatus {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
}

/// Register a new push channel with the provider and persist it.
///
/// Fails fast when no webhook URL is configured: the provider must not be
/// called at all in that case. Nothing is persisted unless the provider
/// confirms the registration. An already-active channel is not stopped
/// implicitly; callers check status first.
pub async fn start_watch(
    provider: &dyn CalendarProvider,
    store: &dyn WatchChannelStore,
    tokens: &StoredTokens,
    webhook_url: Option<&str>,
) -> Result<WatchChannel, ApiError> {
    let webhook_url = webhook_url.ok_or_else(|| {
        ApiError::ConfigurationMissing("WEBHOOK_URL is not configured".to_string())
    })?;

    let channel_id = Uuid::new_v4().to_string();

    let (resource_id, expiration) = provider
        .watch(tokens, &channel_id, webhook_url)
        .await
        .context("Failed to register watch channel")?;

    let channel = WatchChannel {
        channel_id,
        resource_id,
        expiration,
    };
    store
        .put(channel.clone())
        .context("Failed to persist watch channel")?;

    info!(channel_id = %channel.channel_id, expiration, "watch channel registered");
    Ok(channel)
}

/// Stop the active push channel and clear the local record.
///
/// The provider reporting the channel as already gone still counts as a
/// successful stop (the client collapses that case before we see it).
pub async fn stop_watch(
    provider: &dyn CalendarProvider,
    store: &dyn WatchChannelStore,
    tokens: &StoredTokens,
) -> Result<(), ApiError> {
    let channel = store
        .get()
        .context("Failed to read watch channel")?
        .ok_or_else(|| ApiError::NotFound("No active watch channel".to_string()))?;

    provider
        .stop(tokens, &channel.channel_id, &channel.resource_id)
        .await
        .context("Failed to stop watch channel")?;

    store.clear().context("Failed to clear watch channel")?;

    info!(channel_id = %channel.channel_id, "watch channel stopped");
    Ok(())
}

/// Pure function of the stored channel and the current wall clock.
pub fn status(channel: Option<WatchChannel>, now_millis: i64) -> WatchStatus {
    match channel {
        None => WatchStatus {
            active: false,
            channel_id: None,
            resource_id: None,
            expiration: None,
            expired: None,
        },
        Some(channel) => {
            let expired = channel.is_expired(now_millis);
            WatchStatus {
                active: !expired,
                channel_id: Some(channel.channel_id),
                resource_id: Some(channel.resource_id),
                expiration: DateTime::from_timestamp_millis(channel.expiration),
                expired: Some(expired),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MemoryStore, MockProvider, test_tokens};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn start_without_webhook_url_fails_fast_with_zero_provider_calls() {
        let provider = MockProvider::default();
        let store = MemoryStore::default();

        let result = start_watch(&provider, &store, &test_tokens(), None).await;

        assert!(matches!(result, Err(ApiError::ConfigurationMissing(_))));
        assert_eq!(provider.watch_calls.load(Ordering::SeqCst), 0);
        assert!(WatchChannelStore::get(&store).unwrap().is_none());
    }

    #[tokio::test]
    async fn start_persists_the_channel_the_provider_confirmed() {
        let provider = MockProvider::default();
        let store = MemoryStore::default();

        let channel = start_watch(
            &provider,
            &store,
            &test_tokens(),
            Some("https://example.com/webhook"),
        )
        .await
        .unwrap();

        assert_eq!(provider.watch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(channel.resource_id, "resource-1");

        let stored = WatchChannelStore::get(&store).unwrap().unwrap();
        assert_eq!(stored.channel_id, channel.channel_id);
        assert_eq!(stored.expiration, channel.expiration);
    }

    #[tokio::test]
    async fn each_registration_gets_a_fresh_channel_id() {
        let provider = MockProvider::default();
        let store = MemoryStore::default();
        let url = Some("https://example.com/webhook");

        let first = start_watch(&provider, &store, &test_tokens(), url)
            .await
            .unwrap();
        let second = start_watch(&provider, &store, &test_tokens(), url)
            .await
            .unwrap();

        assert_ne!(first.channel_id, second.channel_id);
    }

    #[tokio::test]
    async fn provider_failure_persists_nothing() {
        let provider = MockProvider {
            fail_watch: true,
            ..MockProvider::default()
        };
        let store = MemoryStore::default();

        let result = start_watch(
            &provider,
            &store,
            &test_tokens(),
            Some("https://example.com/webhook"),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Provider(_))));
        assert!(WatchChannelStore::get(&store).unwrap().is_none());
    }

    #[tokio::test]
    async fn stop_without_a_channel_is_not_found() {
        let provider = MockProvider::default();
        let store = MemoryStore::default();

        let result = stop_watch(&provider, &store, &test_tokens()).await;

        assert!(matches!(result, Err(ApiError::NotFound(_))));
        assert_eq!(provider.stop_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_clears_local_state_even_when_the_channel_was_already_gone() {
        // MockProvider::stop succeeds unconditionally, mirroring how the
        // real client collapses "channel not found" into success.
        let provider = MockProvider::default();
        let store = MemoryStore::default();
        store.set_channel(WatchChannel {
            channel_id: "c1".to_string(),
            resource_id: "r1".to_string(),
            expiration: i64::MAX,
        });

        stop_watch(&provider, &store, &test_tokens()).await.unwrap();

        assert_eq!(provider.stop_calls.load(Ordering::SeqCst), 1);
        assert!(WatchChannelStore::get(&store).unwrap().is_none());
    }

    #[tokio::test]
    async fn stop_failure_keeps_the_local_record() {
        let provider = MockProvider {
            fail_stop: true,
            ..MockProvider::default()
        };
        let store = MemoryStore::default();
        store.set_channel(WatchChannel {
            channel_id: "c1".to_string(),
            resource_id: "r1".to_string(),
            expiration: i64::MAX,
        });

        let result = stop_watch(&provider, &store, &test_tokens()).await;

        assert!(matches!(result, Err(ApiError::Provider(_))));
        assert!(WatchChannelStore::get(&store).unwrap().is_some());
    }

    #[test]
    fn status_with_no_channel_omits_the_expired_field() {
        let status = status(None, 1_000);
        assert!(!status.active);
        assert!(status.expired.is_none());
        assert!(status.channel_id.is_none());
    }

    #[test]
    fn status_with_a_live_channel_is_active() {
        let status = status(
            Some(WatchChannel {
                channel_id: "c1".to_string(),
                resource_id: "r1".to_string(),
                expiration: 2_000,
            }),
            1_000,
        );
        assert!(status.active);
        assert_eq!(status.expired, Some(false));
        assert_eq!(status.channel_id.as_deref(), Some("c1"));
    }

    #[test]
    fn status_with_a_past_expiry_is_expired_not_active() {
        let status = status(
            Some(WatchChannel {
                channel_id: "c1".to_string(),
                resource_id: "r1".to_string(),
                expiration: 500,
            }),
            1_000,
        );
        assert!(!status.active);
        assert_eq!(status.expired, Some(true));
        // Identity is still reported so the dashboard can offer a restart.
        assert_eq!(status.resource_id.as_deref(), Some("r1"));
    }

    // Arc is how routes hand these collaborators around; make sure the
    // functions accept them the same way.
    #[tokio::test]
    async fn works_through_trait_objects() {
        let provider: Arc<dyn CalendarProvider> = Arc::new(MockProvider::default());
        let store: Arc<dyn WatchChannelStore> = Arc::new(MemoryStore::default());

        start_watch(
            provider.as_ref(),
            store.as_ref(),
            &test_tokens(),
            Some("https://example.com/webhook"),
        )
        .await
        .unwrap();

        assert!(store.get().unwrap().is_some());
    }
}
