//! Preset-driven file transcoding.
//!
//! A [`Transcoder`] holds registries of [`Adapter`]s and [`Preset`]s. Each
//! request validates the input against the preset and adapter, claims an
//! output path under the configured conflict and directory policies, runs the
//! adapter and publishes lifecycle events on an [`EventBus`].

pub mod adapter;
pub mod config;
pub mod error;
pub mod events;
pub mod file;
pub mod logging;
pub mod preset;
pub mod testing;
pub mod transcoder;

pub use adapter::{
    Adapter, AdapterContext, FfmpegAdapter, FfmpegConfig, HandbrakeAdapter, HandbrakeConfig,
    TextAdapter, Verification,
};
pub use config::{
    load_config, load_config_from_str, validate_config, ConfigError, LoggingConfig,
    TranscoderConfig,
};
pub use error::{ErrorKind, TranscodeError};
pub use events::{EventBus, EventEnvelope, EventKind, MessageLevel, SubscriptionId, TranscodeEvent};
pub use file::{FileDescriptor, FileHandlerDefinition, FileHandlerDefinitionBuilder, FileKind};
pub use logging::init_logging;
pub use preset::{OptionValue, OutputExtension, Preset, PresetBuilder, PresetOptions};
pub use transcoder::{
    ConflictMode, DirectoryMode, FailureMode, FileMode, PresetRef, TranscodeInput,
    TranscodeOptions, Transcoder,
};
