//! Error types shared by every stage of a transcode request.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while validating or executing a transcode.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// A file failed a file handler definition check.
    #[error("Invalid file {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    /// A file handler definition was built with contradictory criteria.
    #[error("Invalid file handler definition: {0}")]
    InvalidDefinition(String),

    /// A preset is structurally invalid or was rejected by its adapter.
    #[error("Invalid preset: {0}")]
    InvalidPreset(String),

    /// A locked preset was asked to change its options.
    #[error("Preset {key} is locked")]
    PresetLocked { key: String },

    /// A caller supplied output path is incompatible with the preset.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The adapter produced something that is not acceptable output.
    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    /// No adapter is registered under the requested key.
    #[error("Adapter not found: {key}")]
    AdapterNotFound { key: String },

    /// No preset is registered under the requested key.
    #[error("Preset not found: {key}")]
    PresetNotFound { key: String },

    /// The output path already exists and the conflict mode forbids replacing it.
    #[error("File already exists: {path}")]
    FileAlreadyExists { path: PathBuf },

    /// A file or directory could not be created, removed or written.
    #[error("Permission error on {path}: {reason}")]
    FilePermission { path: PathBuf, reason: String },

    /// The directory mode forbids an operation the request needs.
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    /// An adapter failed its environment self-check.
    #[error("Adapter {adapter} is not usable in this environment: {reason}")]
    Environment { adapter: String, reason: String },

    /// The adapter ran but the transformation failed.
    #[error("Transcode with adapter {adapter} failed: {reason}")]
    TranscodeFailed {
        adapter: String,
        reason: String,
        stderr: Option<String>,
    },

    /// The adapter's external process exceeded its time budget.
    #[error("Adapter {adapter} timed out after {timeout_secs} seconds")]
    Timeout { adapter: String, timeout_secs: u64 },

    /// Configuration handed to the transcoder failed validation.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializable discriminant of [`TranscodeError`], carried by error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFile,
    InvalidDefinition,
    InvalidPreset,
    PresetLocked,
    InvalidInput,
    InvalidOutput,
    AdapterNotFound,
    PresetNotFound,
    FileAlreadyExists,
    FilePermission,
    InvalidMode,
    Environment,
    TranscodeFailed,
    Timeout,
    Config,
    Io,
}

impl TranscodeError {
    /// Creates an invalid file error.
    pub fn invalid_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Creates an invalid preset error.
    pub fn invalid_preset(reason: impl Into<String>) -> Self {
        Self::InvalidPreset(reason.into())
    }

    /// Creates a file permission error.
    pub fn file_permission(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FilePermission {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an environment error for the given adapter.
    pub fn environment(adapter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Environment {
            adapter: adapter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a transcode failed error with optional stderr output.
    pub fn transcode_failed(
        adapter: impl Into<String>,
        reason: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        Self::TranscodeFailed {
            adapter: adapter.into(),
            reason: reason.into(),
            stderr,
        }
    }

    /// Returns the discriminant of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFile { .. } => ErrorKind::InvalidFile,
            Self::InvalidDefinition(_) => ErrorKind::InvalidDefinition,
            Self::InvalidPreset(_) => ErrorKind::InvalidPreset,
            Self::PresetLocked { .. } => ErrorKind::PresetLocked,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::InvalidOutput(_) => ErrorKind::InvalidOutput,
            Self::AdapterNotFound { .. } => ErrorKind::AdapterNotFound,
            Self::PresetNotFound { .. } => ErrorKind::PresetNotFound,
            Self::FileAlreadyExists { .. } => ErrorKind::FileAlreadyExists,
            Self::FilePermission { .. } => ErrorKind::FilePermission,
            Self::InvalidMode(_) => ErrorKind::InvalidMode,
            Self::Environment { .. } => ErrorKind::Environment,
            Self::TranscodeFailed { .. } => ErrorKind::TranscodeFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether this error was raised before any adapter work started.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidFile { .. }
                | Self::InvalidDefinition(_)
                | Self::InvalidPreset(_)
                | Self::InvalidInput(_)
                | Self::AdapterNotFound { .. }
                | Self::PresetNotFound { .. }
                | Self::Environment { .. }
                | Self::Config(_)
        )
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }
}
