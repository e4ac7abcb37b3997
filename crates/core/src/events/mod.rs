//! Transcode lifecycle events and the bus they are published on.

mod bus;
mod types;

pub use bus::{EventBus, EventHandler, SubscriptionId};
pub use types::{EventEnvelope, EventKind, MessageLevel, TranscodeEvent};
