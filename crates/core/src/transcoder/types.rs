//! Request policies and argument types of the transcoder.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::TranscodeError;
use crate::file::FileDescriptor;
use crate::preset::Preset;

/// What to do when the resolved output path already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictMode {
    /// Remove the existing file or directory tree.
    Delete,
    /// Fail with `FileAlreadyExists`.
    Exception,
    /// Pick the next free numbered path.
    #[default]
    Increment,
}

/// What to do when the output's containing directory is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryMode {
    Create,
    #[default]
    Exception,
}

/// What to do with partial output after a failed transcode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    #[default]
    Delete,
    Preserve,
}

/// Policies applied to a single transcode request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeOptions {
    pub conflict: ConflictMode,
    pub directory: DirectoryMode,
    pub failure: FailureMode,
}

impl TranscodeOptions {
    pub fn with_conflict(mut self, mode: ConflictMode) -> Self {
        self.conflict = mode;
        self
    }

    pub fn with_directory(mut self, mode: DirectoryMode) -> Self {
        self.directory = mode;
        self
    }

    pub fn with_failure(mut self, mode: FailureMode) -> Self {
        self.failure = mode;
        self
    }
}

/// Unix permission bits applied to created files and directories.
///
/// Parses `"644"`, `"0644"` and `"0o644"` as octal; integers are taken as the
/// bits themselves (`0o644`, i.e. `420`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileMode(u32);

impl FileMode {
    pub const MAX: u32 = 0o7777;
    pub const DEFAULT_FILE: FileMode = FileMode(0o644);
    pub const DEFAULT_DIRECTORY: FileMode = FileMode(0o755);

    pub fn from_bits(bits: u32) -> Result<Self, TranscodeError> {
        if bits > Self::MAX {
            return Err(TranscodeError::InvalidMode(format!(
                "mode {bits:o} is out of range"
            )));
        }
        Ok(Self(bits))
    }

    pub fn parse(text: &str) -> Result<Self, TranscodeError> {
        let text = text.trim();
        let digits = text
            .strip_prefix("0o")
            .or_else(|| text.strip_prefix("0O"))
            .unwrap_or(text);
        if digits.is_empty() {
            return Err(TranscodeError::InvalidMode("empty mode".to_string()));
        }
        let bits = u32::from_str_radix(digits, 8).map_err(|_| {
            TranscodeError::InvalidMode(format!("\"{text}\" is not an octal mode"))
        })?;
        Self::from_bits(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

impl FromStr for FileMode {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<u32> for FileMode {
    type Error = TranscodeError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::from_bits(bits)
    }
}

impl TryFrom<&str> for FileMode {
    type Error = TranscodeError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::parse(text)
    }
}

impl TryFrom<String> for FileMode {
    type Error = TranscodeError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl Serialize for FileMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FileMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bits(u32),
            Text(String),
        }

        let mode = match Raw::deserialize(deserializer)? {
            Raw::Bits(bits) => FileMode::from_bits(bits),
            Raw::Text(text) => FileMode::parse(&text),
        };
        mode.map_err(serde::de::Error::custom)
    }
}

/// Input of a transcode: a path to inspect or an already inspected file.
#[derive(Debug, Clone)]
pub enum TranscodeInput {
    Path(PathBuf),
    File(FileDescriptor),
}

impl TranscodeInput {
    pub fn path(&self) -> &Path {
        match self {
            Self::Path(path) => path,
            Self::File(file) => file.path(),
        }
    }

    pub(crate) async fn into_descriptor(self) -> Result<FileDescriptor, TranscodeError> {
        match self {
            Self::Path(path) => FileDescriptor::inspect(path).await,
            Self::File(file) => Ok(file),
        }
    }
}

impl From<PathBuf> for TranscodeInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for TranscodeInput {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&PathBuf> for TranscodeInput {
    fn from(path: &PathBuf) -> Self {
        Self::Path(path.clone())
    }
}

impl From<&str> for TranscodeInput {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<FileDescriptor> for TranscodeInput {
    fn from(file: FileDescriptor) -> Self {
        Self::File(file)
    }
}

/// A preset given by registry key or by value.
#[derive(Debug, Clone)]
pub enum PresetRef {
    Key(String),
    Preset(Arc<Preset>),
}

impl PresetRef {
    pub fn key(&self) -> &str {
        match self {
            Self::Key(key) => key,
            Self::Preset(preset) => preset.key(),
        }
    }
}

impl From<&str> for PresetRef {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PresetRef {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<Preset> for PresetRef {
    fn from(preset: Preset) -> Self {
        Self::Preset(Arc::new(preset))
    }
}

impl From<Arc<Preset>> for PresetRef {
    fn from(preset: Arc<Preset>) -> Self {
        Self::Preset(preset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let options = TranscodeOptions::default();
        assert_eq!(options.conflict, ConflictMode::Increment);
        assert_eq!(options.directory, DirectoryMode::Exception);
        assert_eq!(options.failure, FailureMode::Delete);
    }

    #[test]
    fn test_file_mode_parse() {
        assert_eq!(FileMode::parse("644").unwrap().bits(), 0o644);
        assert_eq!(FileMode::parse("0755").unwrap().bits(), 0o755);
        assert_eq!(FileMode::parse("0o700").unwrap().bits(), 0o700);
        assert_eq!(FileMode::try_from(0o640).unwrap().to_string(), "0640");
        assert!(matches!(
            FileMode::parse("rwx"),
            Err(TranscodeError::InvalidMode(_))
        ));
        assert!(FileMode::parse("899").is_err());
        assert!(FileMode::from_bits(0o17777).is_err());
        assert!(FileMode::parse("").is_err());
    }

    #[test]
    fn test_file_mode_serde() {
        #[derive(Deserialize)]
        struct Modes {
            text: FileMode,
            bits: FileMode,
        }
        let modes: Modes = toml::from_str("text = \"0600\"\nbits = 0o750").unwrap();
        assert_eq!(modes.text.bits(), 0o600);
        assert_eq!(modes.bits.bits(), 0o750);
        assert_eq!(
            serde_json::to_string(&FileMode::DEFAULT_FILE).unwrap(),
            "\"0644\""
        );

        let result: Result<Modes, _> = toml::from_str("text = \"abc\"\nbits = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_options_serde() {
        let options: TranscodeOptions =
            toml::from_str("conflict = \"exception\"\nfailure = \"preserve\"").unwrap();
        assert_eq!(options.conflict, ConflictMode::Exception);
        assert_eq!(options.directory, DirectoryMode::Exception);
        assert_eq!(options.failure, FailureMode::Preserve);
    }

    #[test]
    fn test_preset_ref_key() {
        assert_eq!(PresetRef::from("text.to_lower").key(), "text.to_lower");
        let preset = Preset::new("custom", "text").unwrap();
        assert_eq!(PresetRef::from(preset).key(), "custom");
    }
}
