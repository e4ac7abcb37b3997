//! State shared by every adapter implementation.

use std::future::Future;
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::OnceCell;

use crate::error::TranscodeError;
use crate::events::{EventBus, MessageLevel, TranscodeEvent};
use crate::file::FileHandlerDefinition;

/// Outcome of an adapter's environment check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Unverified,
    Verified,
    Failed(String),
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Per-instance adapter state: file rules, the memoized environment check and
/// the event bus messages are published on.
///
/// Adapters embed one of these and return it from
/// [`Adapter::context`](super::Adapter::context).
#[derive(Debug)]
pub struct AdapterContext {
    key: String,
    input_definition: FileHandlerDefinition,
    output_definition: FileHandlerDefinition,
    verification: OnceCell<Verification>,
    bus: RwLock<Option<Weak<EventBus>>>,
}

impl AdapterContext {
    /// Creates a context whose definitions accept anything.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            input_definition: FileHandlerDefinition::any(),
            output_definition: FileHandlerDefinition::any(),
            verification: OnceCell::new(),
            bus: RwLock::new(None),
        }
    }

    pub fn with_input_definition(mut self, definition: FileHandlerDefinition) -> Self {
        self.input_definition = definition;
        self
    }

    pub fn with_output_definition(mut self, definition: FileHandlerDefinition) -> Self {
        self.output_definition = definition;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn input_definition(&self) -> &FileHandlerDefinition {
        &self.input_definition
    }

    pub fn output_definition(&self) -> &FileHandlerDefinition {
        &self.output_definition
    }

    // Verification

    /// Runs `check` on first call and memoizes its outcome for the lifetime of
    /// this context. Later calls return the stored outcome without running `check`.
    pub async fn verify_with<F, Fut>(&self, check: F) -> &Verification
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), TranscodeError>>,
    {
        self.verification
            .get_or_init(|| async move {
                match check().await {
                    Ok(()) => {
                        tracing::debug!(adapter = %self.key, "Adapter environment verified");
                        Verification::Verified
                    }
                    Err(e) => {
                        let message = match e {
                            TranscodeError::Environment { reason, .. } => reason,
                            other => other.to_string(),
                        };
                        tracing::warn!(
                            adapter = %self.key,
                            error = %message,
                            "Adapter environment check failed"
                        );
                        Verification::Failed(message)
                    }
                }
            })
            .await
    }

    /// Returns the memoized verification outcome, `Unverified` before the first check.
    pub fn verification(&self) -> Verification {
        self.verification
            .get()
            .cloned()
            .unwrap_or(Verification::Unverified)
    }

    // Event bus

    /// Attaches the bus messages are published on. Only a weak reference is kept.
    pub fn attach(&self, bus: &Arc<EventBus>) {
        *self.bus.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::downgrade(bus));
    }

    pub fn detach(&self) {
        *self.bus.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Returns the attached bus if it is still alive.
    pub fn bus(&self) -> Option<Arc<EventBus>> {
        self.bus
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(Weak::upgrade)
    }

    // Messages

    /// Logs a message and publishes it on the attached bus, if any.
    pub fn message(&self, level: MessageLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            MessageLevel::Debug => tracing::debug!(adapter = %self.key, "{}", text),
            MessageLevel::Info => tracing::info!(adapter = %self.key, "{}", text),
            MessageLevel::Warn => tracing::warn!(adapter = %self.key, "{}", text),
            MessageLevel::Error => tracing::error!(adapter = %self.key, "{}", text),
        }

        if let Some(bus) = self.bus() {
            bus.publish(TranscodeEvent::Message {
                level,
                text,
                adapter: self.key.clone(),
            });
        }
    }

    pub fn debug(&self, text: impl Into<String>) {
        self.message(MessageLevel::Debug, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.message(MessageLevel::Info, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.message(MessageLevel::Warn, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.message(MessageLevel::Error, text);
    }
}
