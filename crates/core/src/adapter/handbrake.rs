//! HandBrakeCLI adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::context::AdapterContext;
use super::process::{probe_executable, CliProcess};
use super::traits::Adapter;
use crate::error::TranscodeError;
use crate::file::{FileDescriptor, FileHandlerDefinition, FileKind};
use crate::preset::Preset;

/// Long option names accepted in handbrake presets and the flags they map to.
const FLAGS: &[(&str, &str)] = &[
    ("select-title", "--title"),
    ("min-duration", "--min-duration"),
    ("scan-titles", "--scan"),
    ("detect-select-main-feature-title", "--main-feature"),
    ("select-chapters", "-c"),
    ("select-dvd-angle", "--angle"),
    ("select-num-previews", "--previews"),
    ("start-at-preview", "--start-at-preview"),
    ("start-encoding-at", "--start-at"),
    ("stop-encoding-at", "--stop-at"),
    ("format", "-f"),
    ("add-chapter-markers", "-m"),
    ("use-64-bit-mp4-files", "-4"),
    ("optimize-mp4-for-http-streaming", "-O"),
    ("mark-mp4-file-for-5.5g-ipods", "-I"),
    ("video-library-encoder", "-e"),
    ("x264-preset", "--x264-preset"),
    ("x264-tune", "--x264-tune"),
    ("advanced-encoder-options", "-x"),
    ("x264-profile", "--x264-profile"),
    ("video-quality", "-q"),
    ("video-bitrate", "-b"),
    ("use-two-pass-mode", "--two-pass"),
    ("use-turbo-options", "-T"),
    ("video-framerate", "-r"),
    ("variable-frame-control-rate", "--vfr"),
    ("constant-frame-control-rate", "--cfr"),
    ("peak-limited-frame-control-rate", "--pfr"),
    ("select-audio-tracks", "-a"),
    ("audio-encoder", "-E"),
    ("audio-copy-mask", "--audio-copy-mask"),
    ("audio-fallback", "--audio-fallback"),
    ("audio-bitrate", "-B"),
    ("audio-quality-metric", "-Q"),
    ("audio-compression-metric", "-C"),
    ("surround-sound-downmixing", "-6"),
    ("audio-samplerate", "-R"),
    ("dynamic-range-compression", "-D"),
    ("amplify-audio-before-encoding", "--gain"),
    ("audio-track-names", "-A"),
    ("picture-width", "-w"),
    ("picture-height", "-l"),
    ("cropping-values", "--crop"),
    ("loose-crop", "--loose-crop"),
    ("max-height", "-Y"),
    ("max-width", "-X"),
    ("strict-anamorphic-pixel-aspect-ratio", "--strict-anamorphic"),
    ("loose-anamorphic-pixel-aspect-ratio", "--loose-anamorphic"),
    ("custom-anamorphic-pixel-aspect-ratio", "--custom-anamorphic"),
    (
        "width-to-scale-pixels-to-at-playback-for-custom-anamorphic",
        "--display-width",
    ),
    (
        "keep-display-aspect-ratio-for-custom-anamorphic",
        "--keep-display-aspect",
    ),
    ("pixel-aspect-for-custom-anamorphic", "--pixel-aspect"),
    (
        "use-wider-itu-pixel-aspect-for-loose-and-custom-anamorphic",
        "--itu-par",
    ),
    ("number-scaled-pixel-dimensions-divide-cleanly-by", "--modulus"),
    ("color-space-signaled-by-output", "-M"),
    ("deinterlace-video", "-d"),
    ("deinterlace-when-detects-combing", "-5"),
    ("detelecine-video-with-pullup-filter", "-9"),
    ("denoise-video-with-hqdn3d-filter", "-8"),
    ("deblock-video-with-pp7-filter", "-7"),
    ("flip-image-axes", "--rotate"),
    ("grayscale-encoding", "-g"),
    ("subtitle-tracks", "-s"),
    ("subtitle-forced", "-F"),
    ("subtitle-burn", "--subtitle-burn"),
    ("subtitle-default", "--subtitle-default"),
    ("native-language", "--native-language"),
    ("native-dub", "--native-dub"),
    ("subrip-srt-filenames", "--srt-file"),
    ("codeset-to-encode-srt-files", "--srt-codeset"),
    ("offset-for-srt-files", "--srt-offset"),
    ("language-for-srt-files", "--srt-lang"),
    ("flag-srt-as-default-subtitle", "--srt-default"),
];

/// Returns the HandBrakeCLI flag for a long option name.
pub fn flag_for(option: &str) -> Option<&'static str> {
    FLAGS
        .iter()
        .find(|(name, _)| *name == option)
        .map(|&(_, flag)| flag)
}

/// Configuration for the HandBrake adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandbrakeConfig {
    /// Path to HandBrakeCLI binary.
    #[serde(default = "default_handbrake_path")]
    pub path: PathBuf,

    /// Timeout for a single transcode in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub stream_output: bool,
}

fn default_handbrake_path() -> PathBuf {
    PathBuf::from("HandBrakeCLI")
}

fn default_timeout() -> u64 {
    3600
}

impl Default for HandbrakeConfig {
    fn default() -> Self {
        Self {
            path: default_handbrake_path(),
            timeout_secs: default_timeout(),
            stream_output: false,
        }
    }
}

impl HandbrakeConfig {
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Runs HandBrakeCLI video conversions described by handbrake presets.
#[derive(Debug)]
pub struct HandbrakeAdapter {
    config: HandbrakeConfig,
    context: AdapterContext,
}

impl HandbrakeAdapter {
    pub const KEY: &'static str = "handbrake";

    pub fn new(config: HandbrakeConfig) -> Result<Self, TranscodeError> {
        let input = FileHandlerDefinition::builder()
            .required_type(FileKind::File)
            .build()?;
        Ok(Self {
            config,
            context: AdapterContext::new(Self::KEY).with_input_definition(input),
        })
    }

    pub fn with_defaults() -> Result<Self, TranscodeError> {
        Self::new(HandbrakeConfig::default())
    }

    /// Builds `-i <input> -o <output>` followed by the mapped preset options.
    pub fn build_args(
        &self,
        input: &Path,
        preset: &Preset,
        output: &Path,
    ) -> Result<Vec<String>, TranscodeError> {
        let mut args = vec![
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-o".to_string(),
            output.to_string_lossy().to_string(),
        ];

        for (key, value) in preset.options().iter() {
            let flag = flag_for(key).ok_or_else(|| unknown_option(preset, key))?;
            args.push(flag.to_string());
            if !value.is_empty_text() {
                args.push(value.to_string());
            }
        }

        Ok(args)
    }
}

fn unknown_option(preset: &Preset, key: &str) -> TranscodeError {
    TranscodeError::invalid_preset(format!(
        "preset {} has option \"{key}\" which HandBrakeCLI does not support",
        preset.key()
    ))
}

#[async_trait]
impl Adapter for HandbrakeAdapter {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "Handbrake"
    }

    fn description(&self) -> &str {
        "Uses HandBrakeCLI to run video conversions."
    }

    fn context(&self) -> &AdapterContext {
        &self.context
    }

    async fn verify_environment(&self) -> Result<(), TranscodeError> {
        probe_executable(Self::KEY, &self.config.path, "--version").await
    }

    fn validate_preset(&self, preset: &Preset) -> Result<(), TranscodeError> {
        match preset.options().keys().find(|key| flag_for(key).is_none()) {
            Some(key) => Err(unknown_option(preset, key)),
            None => Ok(()),
        }
    }

    async fn transcode(
        &self,
        input: &FileDescriptor,
        preset: &Preset,
        output: &Path,
    ) -> Result<FileDescriptor, TranscodeError> {
        let args = self.build_args(input.path(), preset, output)?;
        CliProcess::new(&self.config.path)
            .args(args)
            .timeout_secs(self.config.timeout_secs)
            .stream_output(self.config.stream_output)
            .run(&self.context)
            .await?;
        FileDescriptor::inspect(output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::catalog;

    #[test]
    fn test_flag_mapping() {
        assert_eq!(flag_for("video-quality"), Some("-q"));
        assert_eq!(flag_for("audio-bitrate"), Some("-B"));
        assert_eq!(flag_for("format"), Some("-f"));
        assert_eq!(flag_for("add-chapter-markers"), Some("-m"));
        assert_eq!(flag_for("not-an-option"), None);
    }

    #[test]
    fn test_build_args_for_classic_preset() {
        let adapter = HandbrakeAdapter::with_defaults().unwrap();
        let preset = catalog::handbrake_classic().unwrap();
        let args = adapter
            .build_args(Path::new("/in/a.avi"), &preset, Path::new("/out/a.mp4"))
            .unwrap();
        assert_eq!(&args[..4], &["-i", "/in/a.avi", "-o", "/out/a.mp4"]);
        assert_eq!(&args[4..6], &["-e", "x264"]);
        assert!(args.ends_with(&["-f".to_string(), "mp4".to_string()]));
    }

    #[test]
    fn test_bare_flags_have_no_value() {
        let adapter = HandbrakeAdapter::with_defaults().unwrap();
        let preset = Preset::builder("handbrake.custom", "handbrake")
            .option("add-chapter-markers", "")
            .option("video-quality", 22)
            .build()
            .unwrap();
        let args = adapter
            .build_args(Path::new("/a.mov"), &preset, Path::new("/b.mp4"))
            .unwrap();
        assert_eq!(args[4..], ["-m", "-q", "22"]);
    }

    #[test]
    fn test_validate_preset_rejects_unknown_options() {
        let adapter = HandbrakeAdapter::with_defaults().unwrap();
        for preset in [
            catalog::handbrake_classic().unwrap(),
            catalog::handbrake_normal().unwrap(),
            catalog::handbrake_high_profile().unwrap(),
        ] {
            adapter.validate_preset(&preset).unwrap();
        }

        let preset = Preset::builder("handbrake.bad", "handbrake")
            .option("-q", "20")
            .build()
            .unwrap();
        assert!(matches!(
            adapter.validate_preset(&preset),
            Err(TranscodeError::InvalidPreset(_))
        ));
        assert!(adapter
            .build_args(Path::new("/a.mov"), &preset, Path::new("/b.mp4"))
            .is_err());
    }
}
