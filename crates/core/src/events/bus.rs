//! Synchronous publish/subscribe bus for transcode events.
//!
//! Handlers run on the publishing task, in subscription order. A handler that
//! fails or panics is logged and skipped.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use super::types::{EventEnvelope, EventKind, TranscodeEvent};

/// Event handler. Returned errors are logged and discarded.
pub type EventHandler = Arc<dyn Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync>;

/// Identifies a subscription for [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    kind: Option<EventKind>,
    handler: EventHandler,
}

/// Synchronous in-process publish/subscribe channel.
///
/// Publishing calls every matching handler on the publishing task. A handler
/// that fails or panics is logged and skipped; it never affects the publisher
/// or the remaining handlers.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to a single event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add(Some(kind), Arc::new(handler))
    }

    /// Subscribes to every event.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&EventEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add(None, Arc::new(handler))
    }

    /// Forwards every event into a bounded channel.
    ///
    /// Sending never waits: when the channel is full the event is dropped with a warning.
    pub fn channel(&self, capacity: usize) -> (SubscriptionId, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = self.subscribe_all(move |envelope| {
            tx.try_send(envelope.clone())
                .map_err(|e| anyhow::anyhow!("event channel rejected {}: {e}", envelope.kind()))
        });
        (id, rx)
    }

    /// Removes a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Publishes an event to all matching subscribers.
    pub fn publish(&self, event: TranscodeEvent) {
        let envelope = EventEnvelope::new(event);
        let kind = envelope.kind();

        // Handlers run without the lock held so they may (un)subscribe.
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|s| s.kind.is_none_or(|k| k == kind))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(&envelope))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(event = %kind, error = %e, "Event handler failed");
                }
                Err(_) => {
                    tracing::warn!(event = %kind, "Event handler panicked");
                }
            }
        }
    }

    fn add(&self, kind: Option<EventKind>, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscription { id, kind, handler });
        id
    }
}
