use serde::{Deserialize, Serialize};

use crate::adapter::{FfmpegConfig, HandbrakeConfig};
use crate::transcoder::{FileMode, TranscodeOptions};

/// Root configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TranscoderConfig {
    /// Permission bits applied to output files, as `"0644"` or an integer.
    #[serde(default = "default_file_mode")]
    pub file_creation_mode: FileMode,
    /// Permission bits applied to created directories.
    #[serde(default = "default_directory_mode")]
    pub directory_creation_mode: FileMode,
    /// Policies used by requests that do not pass their own.
    #[serde(default)]
    pub defaults: TranscodeOptions,
    /// Register the bundled preset catalog.
    #[serde(default = "default_true")]
    pub register_builtin_presets: bool,
    /// FFmpeg adapter, registered only when present.
    #[serde(default)]
    pub ffmpeg: Option<FfmpegConfig>,
    /// HandBrake adapter, registered only when present.
    #[serde(default)]
    pub handbrake: Option<HandbrakeConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            file_creation_mode: default_file_mode(),
            directory_creation_mode: default_directory_mode(),
            defaults: TranscodeOptions::default(),
            register_builtin_presets: true,
            ffmpeg: None,
            handbrake: None,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_file_mode() -> FileMode {
    FileMode::DEFAULT_FILE
}

fn default_directory_mode() -> FileMode {
    FileMode::DEFAULT_DIRECTORY
}

fn default_true() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

fn default_filter() -> String {
    "transcoding_core=info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::{ConflictMode, FailureMode};
    use std::path::PathBuf;

    #[test]
    fn test_deserialize_empty_config() {
        let config: TranscoderConfig = toml::from_str("").unwrap();
        assert_eq!(config, TranscoderConfig::default());
        assert_eq!(config.file_creation_mode.bits(), 0o644);
        assert_eq!(config.directory_creation_mode.bits(), 0o755);
        assert!(config.register_builtin_presets);
        assert!(config.ffmpeg.is_none());
        assert_eq!(config.logging.filter, "transcoding_core=info");
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
file_creation_mode = "0640"
directory_creation_mode = 0o750
register_builtin_presets = false

[defaults]
conflict = "exception"
failure = "preserve"

[ffmpeg]
path = "/usr/local/bin/ffmpeg"
timeout_secs = 600

[handbrake]

[logging]
filter = "debug"
json = true
"#;
        let config: TranscoderConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.file_creation_mode.bits(), 0o640);
        assert_eq!(config.directory_creation_mode.bits(), 0o750);
        assert!(!config.register_builtin_presets);
        assert_eq!(config.defaults.conflict, ConflictMode::Exception);
        assert_eq!(config.defaults.failure, FailureMode::Preserve);

        let ffmpeg = config.ffmpeg.as_ref().unwrap();
        assert_eq!(ffmpeg.path, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(ffmpeg.timeout_secs, 600);
        assert_eq!(config.handbrake, Some(HandbrakeConfig::default()));
        assert!(config.logging.json);
    }

    #[test]
    fn test_deserialize_bad_mode_fails() {
        let result: Result<TranscoderConfig, _> =
            toml::from_str("file_creation_mode = \"rw-r--r--\"");
        assert!(result.is_err());
    }
}
