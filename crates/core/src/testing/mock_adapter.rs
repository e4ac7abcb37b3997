//! Mock adapter for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::adapter::{Adapter, AdapterContext};
use crate::error::TranscodeError;
use crate::file::{FileDescriptor, FileHandlerDefinition};
use crate::preset::Preset;

/// A recorded transcode call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub input: PathBuf,
    pub preset: String,
    pub output: PathBuf,
}

/// Mock implementation of the Adapter trait.
///
/// Provides controllable behavior for testing:
/// - Record transcode calls, environment checks and cleanups
/// - Simulate a broken environment
/// - Simulate failures, optionally after writing partial output
/// - Report a different output path than the one it was given
///
/// Successful transcodes write `content` to the output path, or into a
/// `part-1` file when the preset outputs a directory.
#[derive(Debug)]
pub struct MockAdapter {
    key: String,
    context: AdapterContext,
    content: Vec<u8>,
    environment_error: Option<String>,
    failure: Option<String>,
    partial_output: bool,
    reported_output: Option<PathBuf>,
    calls: Mutex<Vec<MockCall>>,
    cleanups: Mutex<Vec<PathBuf>>,
    environment_checks: AtomicUsize,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    pub const KEY: &'static str = "mock";

    /// Create a new mock adapter that accepts anything and always succeeds.
    pub fn new() -> Self {
        Self::with_key(Self::KEY)
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            context: AdapterContext::new(key.clone()),
            key,
            content: b"mock output".to_vec(),
            environment_error: None,
            failure: None,
            partial_output: false,
            reported_output: None,
            calls: Mutex::new(Vec::new()),
            cleanups: Mutex::new(Vec::new()),
            environment_checks: AtomicUsize::new(0),
        }
    }

    pub fn with_input_definition(mut self, definition: FileHandlerDefinition) -> Self {
        self.context = self.context.with_input_definition(definition);
        self
    }

    pub fn with_output_definition(mut self, definition: FileHandlerDefinition) -> Self {
        self.context = self.context.with_output_definition(definition);
        self
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    /// Makes the environment check fail with `reason`.
    pub fn with_broken_environment(mut self, reason: impl Into<String>) -> Self {
        self.environment_error = Some(reason.into());
        self
    }

    /// Makes every transcode fail with `reason`.
    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Writes output before failing.
    pub fn with_partial_output(mut self) -> Self {
        self.partial_output = true;
        self
    }

    /// Reports `path` as the produced output instead of the given output path.
    pub fn reporting_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.reported_output = Some(path.into());
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Output paths passed to `cleanup_failed_transcode`.
    pub fn cleanups(&self) -> Vec<PathBuf> {
        self.cleanups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of times the environment check actually ran.
    pub fn environment_checks(&self) -> usize {
        self.environment_checks.load(Ordering::SeqCst)
    }

    async fn write_output(&self, preset: &Preset, output: &Path) -> Result<(), TranscodeError> {
        let target = if preset.outputs_directory() {
            output.join("part-1")
        } else {
            output.to_path_buf()
        };
        tokio::fs::write(&target, &self.content).await.map_err(|e| {
            TranscodeError::transcode_failed(
                &self.key,
                format!("could not write {}: {e}", target.display()),
                None,
            )
        })
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        "Mock"
    }

    fn context(&self) -> &AdapterContext {
        &self.context
    }

    async fn verify_environment(&self) -> Result<(), TranscodeError> {
        self.environment_checks.fetch_add(1, Ordering::SeqCst);
        match &self.environment_error {
            Some(reason) => Err(TranscodeError::environment(&self.key, reason)),
            None => Ok(()),
        }
    }

    async fn transcode(
        &self,
        input: &FileDescriptor,
        preset: &Preset,
        output: &Path,
    ) -> Result<FileDescriptor, TranscodeError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockCall {
                input: input.path().to_path_buf(),
                preset: preset.key().to_string(),
                output: output.to_path_buf(),
            });

        if let Some(reason) = &self.failure {
            if self.partial_output {
                self.write_output(preset, output).await?;
            }
            self.context.error(format!("Simulated failure: {reason}"));
            return Err(TranscodeError::transcode_failed(
                &self.key,
                reason,
                Some("mock stderr".to_string()),
            ));
        }

        self.write_output(preset, output).await?;
        let reported = self.reported_output.as_deref().unwrap_or(output);
        if !tokio::fs::try_exists(reported).await.unwrap_or(false) {
            return Ok(FileDescriptor::from_parts(
                reported,
                crate::file::FileKind::File,
                mime::APPLICATION_OCTET_STREAM,
            ));
        }
        FileDescriptor::inspect(reported).await
    }

    async fn cleanup_failed_transcode(&self, output: &Path) {
        self.cleanups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(output.to_path_buf());
    }
}
