//! Presets: named adapter options plus input/output file rules.

pub mod catalog;
mod options;
#[allow(clippy::module_inception)]
mod preset;

pub use options::{OptionValue, PresetOptions};
pub use preset::{OutputExtension, Preset, PresetBuilder, DEFAULT_DESCRIPTION, DYNAMIC_PRESET_KEY};
