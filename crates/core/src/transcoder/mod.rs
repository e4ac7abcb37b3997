//! Request dispatch: registries, request policies and output path handling.

mod output;
#[allow(clippy::module_inception)]
mod transcoder;
mod types;

pub use transcoder::Transcoder;
pub use types::{
    ConflictMode, DirectoryMode, FailureMode, FileMode, PresetRef, TranscodeInput,
    TranscodeOptions,
};
