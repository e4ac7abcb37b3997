//! Event bus subscriber that records published events.

use std::sync::{Arc, Mutex};

use crate::events::{EventBus, EventEnvelope, EventKind, SubscriptionId, TranscodeEvent};

/// Records every event published on a bus, in order.
#[derive(Debug)]
pub struct EventRecorder {
    envelopes: Arc<Mutex<Vec<EventEnvelope>>>,
    subscription: SubscriptionId,
}

impl EventRecorder {
    /// Subscribes a new recorder to all events on `bus`.
    pub fn attach(bus: &EventBus) -> Self {
        let envelopes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&envelopes);
        let subscription = bus.subscribe_all(move |envelope| {
            sink.lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(envelope.clone());
            Ok(())
        });
        Self {
            envelopes,
            subscription,
        }
    }

    pub fn envelopes(&self) -> Vec<EventEnvelope> {
        self.envelopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn events(&self) -> Vec<TranscodeEvent> {
        self.envelopes().into_iter().map(|e| e.event).collect()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.envelopes().iter().map(EventEnvelope::kind).collect()
    }

    /// Returns recorded events of one kind.
    pub fn of_kind(&self, kind: EventKind) -> Vec<TranscodeEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind() == kind)
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.of_kind(kind).len()
    }

    /// Returns recorded kinds without adapter messages.
    pub fn lifecycle_kinds(&self) -> Vec<EventKind> {
        self.kinds()
            .into_iter()
            .filter(|k| *k != EventKind::Message)
            .collect()
    }

    pub fn clear(&self) {
        self.envelopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Unsubscribes from `bus`. Recorded events stay readable.
    pub fn detach(&self, bus: &EventBus) -> bool {
        bus.unsubscribe(self.subscription)
    }
}
