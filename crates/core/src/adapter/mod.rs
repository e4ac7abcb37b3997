//! Adapters perform the actual file transformation for a preset.
//!
//! This module provides:
//! - [`Adapter`]: the executor trait the transcoder dispatches to
//! - [`AdapterContext`]: file rules, memoized verification and message publishing
//! - [`CliProcess`]: process runner used by command line adapters
//! - [`TextAdapter`], [`FfmpegAdapter`], [`HandbrakeAdapter`]: bundled adapters

mod context;
mod ffmpeg;
mod handbrake;
mod process;
mod text;
mod traits;

pub use context::{AdapterContext, Verification};
pub use ffmpeg::{FfmpegAdapter, FfmpegConfig, INPUT_MARKER, OUTPUT_MARKER};
pub use handbrake::{flag_for, HandbrakeAdapter, HandbrakeConfig};
pub use process::{probe_executable, CliOutput, CliProcess};
pub use text::{TextAdapter, TextTransform, FUNC_OPTION};
pub use traits::Adapter;
