//! In-process publish/subscribe hub connecting the webhook ingress path to
//! live browser connections.
//!
//! Each subscriber gets its own unbounded queue, so a slow SSE write never
//! stalls the webhook handler. Delivery is best-effort and at-most-once:
//! a publish reaches whoever is registered at that instant, and nothing is
//! buffered for subscribers that arrive later.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_util::Stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

/// Topic published on every calendar change notification.
pub const CALENDAR_UPDATE: &str = "calendar-update";

type Registry = HashMap<String, HashMap<u64, mpsc::UnboundedSender<Value>>>;

/// The hub is an explicitly constructed value cloned into application state,
/// not a process-wide singleton, so tests get a fresh instance each.
#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    topics: Mutex<Registry>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber on `topic`. The returned subscription
    /// removes itself from the registry when dropped, so an aborted
    /// connection can never leak its registration.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut topics = self.inner.topics.lock().unwrap();
        topics.entry(topic.to_string()).or_default().insert(id, tx);

        Subscription {
            hub: self.clone(),
            topic: topic.to_string(),
            id,
            rx,
        }
    }

    /// Remove a subscriber. Unknown ids and repeated calls are no-ops.
    pub fn unsubscribe(&self, topic: &str, id: u64) {
        let mut topics = self.inner.topics.lock().unwrap();
        if let Some(subs) = topics.get_mut(topic) {
            subs.remove(&id);
            if subs.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Deliver `data` to every subscriber registered on `topic` at this
    /// instant. A subscriber whose receiving end is already gone is pruned
    /// and never prevents delivery to the rest.
    pub fn publish(&self, topic: &str, data: Value) {
        // Snapshot under the lock, send outside it: connection teardown may
        // run concurrently with a publish touching the same subscriber.
        let targets: Vec<(u64, mpsc::UnboundedSender<Value>)> = {
            let topics = self.inner.topics.lock().unwrap();
            match topics.get(topic) {
                Some(subs) => subs.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
                None => Vec::new(),
            }
        };

        let mut dead = Vec::new();
        for (id, tx) in &targets {
            if tx.send(data.clone()).is_err() {
                dead.push(*id);
            }
        }

        for id in dead {
            self.unsubscribe(topic, id);
        }

        debug!(topic, subscribers = targets.len(), "published");
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.inner.topics.lock().unwrap();
        topics.get(topic).map(|subs| subs.len()).unwrap_or(0)
    }
}

/// One subscriber's end of the hub: a queue of published payloads.
pub struct Subscription {
    hub: Hub,
    topic: String,
    id: u64,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Close the receiving end without unsubscribing, leaving a dangling
    /// sender in the registry for publish to prune.
    #[cfg(test)]
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl Stream for Subscription {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.topic, self.id);
    }
}
