//! Testing utilities for code built on the transcoder.
//!
//! This module provides a scriptable [`MockAdapter`] and an [`EventRecorder`]
//! that captures everything published on an event bus.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use transcoding_core::testing::{EventRecorder, MockAdapter};
//! use transcoding_core::{Preset, Transcoder};
//!
//! let mut transcoder = Transcoder::new();
//! let adapter = Arc::new(MockAdapter::new().with_failure("boom"));
//! transcoder.register_adapter(adapter.clone());
//! let recorder = EventRecorder::attach(transcoder.events());
//!
//! let result = transcoder.transcode_with_preset("in.txt", preset, None, None).await;
//! assert!(result.is_err());
//! assert_eq!(adapter.calls().len(), 1);
//! ```

mod event_recorder;
mod mock_adapter;

pub use event_recorder::EventRecorder;
pub use mock_adapter::{MockAdapter, MockCall};
