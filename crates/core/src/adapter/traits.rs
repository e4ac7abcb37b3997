//! Trait definitions for the adapter module.

use async_trait::async_trait;
use std::path::Path;

use super::context::{AdapterContext, Verification};
use crate::error::TranscodeError;
use crate::file::{FileDescriptor, FileHandlerDefinition};
use crate::preset::{Preset, DEFAULT_DESCRIPTION};

/// An executor that turns an input file into an output file according to a preset.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Returns the unique registry key of this adapter.
    fn key(&self) -> &str;

    /// Returns the display name, the key by default.
    fn name(&self) -> &str {
        self.key()
    }

    fn description(&self) -> &str {
        DEFAULT_DESCRIPTION
    }

    /// Returns the per-instance state backing the provided methods.
    fn context(&self) -> &AdapterContext;

    fn input_definition(&self) -> &FileHandlerDefinition {
        self.context().input_definition()
    }

    fn output_definition(&self) -> &FileHandlerDefinition {
        self.context().output_definition()
    }

    /// Checks that whatever the adapter depends on is available.
    async fn verify_environment(&self) -> Result<(), TranscodeError> {
        Ok(())
    }

    /// Returns whether the environment check passed.
    ///
    /// The check runs on first call only; its outcome is kept for the lifetime
    /// of the adapter.
    async fn verify(&self) -> bool {
        self.context()
            .verify_with(|| self.verify_environment())
            .await
            .is_verified()
    }

    /// Returns the message of a failed environment check.
    fn verification_error(&self) -> Option<String> {
        match self.context().verification() {
            Verification::Failed(message) => Some(message),
            _ => None,
        }
    }

    fn validate_input_file(&self, file: &FileDescriptor) -> Result<(), TranscodeError> {
        self.input_definition().validate(file)
    }

    fn validate_output_file(&self, file: &FileDescriptor) -> Result<(), TranscodeError> {
        self.output_definition().validate(file)
    }

    /// Checks that the preset's options make sense for this adapter.
    fn validate_preset(&self, _preset: &Preset) -> Result<(), TranscodeError> {
        Ok(())
    }

    /// Produces the output at `output` and returns its descriptor.
    async fn transcode(
        &self,
        input: &FileDescriptor,
        preset: &Preset,
        output: &Path,
    ) -> Result<FileDescriptor, TranscodeError>;

    /// Removes adapter specific leftovers of a failed transcode. Must not fail.
    async fn cleanup_failed_transcode(&self, _output: &Path) {}
}
