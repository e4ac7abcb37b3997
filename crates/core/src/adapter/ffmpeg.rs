//! FFmpeg-based adapter implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::context::AdapterContext;
use super::process::{probe_executable, CliProcess};
use super::traits::Adapter;
use crate::error::TranscodeError;
use crate::file::{FileDescriptor, FileHandlerDefinition, BINARY_CHARSET};
use crate::preset::Preset;

/// Option key marking where the input path goes in the argument list.
pub const INPUT_MARKER: &str = "-i";
/// Option key marking where the output path goes in the argument list.
pub const OUTPUT_MARKER: &str = "-o";

/// Matches ffmpeg's periodic status lines on stderr.
const PROGRESS_PATTERN: &str = r"^(frame=|size=|out_time|progress=)|time=\d{2}:\d{2}:\d{2}";

/// Configuration for the FFmpeg adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FfmpegConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub path: PathBuf,

    /// Timeout for a single transcode in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Report process output line by line while ffmpeg runs.
    #[serde(default)]
    pub stream_output: bool,

    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_timeout() -> u64 {
    3600 // 1 hour
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            path: default_ffmpeg_path(),
            timeout_secs: default_timeout(),
            stream_output: false,
            extra_args: Vec::new(),
        }
    }
}

impl FfmpegConfig {
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_stream_output(mut self, stream: bool) -> Self {
        self.stream_output = stream;
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }
}

/// Runs ffmpeg with arguments taken from the preset's options.
#[derive(Debug)]
pub struct FfmpegAdapter {
    config: FfmpegConfig,
    context: AdapterContext,
}

impl FfmpegAdapter {
    pub const KEY: &'static str = "ffmpeg";

    pub fn new(config: FfmpegConfig) -> Result<Self, TranscodeError> {
        let input = FileHandlerDefinition::builder()
            .allowed_mime_encodings([BINARY_CHARSET])
            .build()?;
        Ok(Self {
            config,
            context: AdapterContext::new(Self::KEY).with_input_definition(input),
        })
    }

    pub fn with_defaults() -> Result<Self, TranscodeError> {
        Self::new(FfmpegConfig::default())
    }

    pub fn config(&self) -> &FfmpegConfig {
        &self.config
    }

    /// Builds ffmpeg arguments from the preset options, in option order.
    ///
    /// The `-i` and `-o` option keys place the input and output paths; without
    /// them the input goes first and the output last.
    pub fn build_args(&self, input: &Path, preset: &Preset, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy().to_string();
        let output = output.to_string_lossy().to_string();

        // Overwrite the claimed output path
        let mut args = vec!["-y".to_string()];
        args.extend(self.config.extra_args.iter().cloned());

        if !preset.has(INPUT_MARKER) {
            args.extend([INPUT_MARKER.to_string(), input.clone()]);
        }

        for (key, value) in preset.options().iter() {
            match key {
                INPUT_MARKER => args.extend([INPUT_MARKER.to_string(), input.clone()]),
                OUTPUT_MARKER => args.push(output.clone()),
                _ => {
                    args.push(key.to_string());
                    if !value.is_empty_text() {
                        args.push(value.to_string());
                    }
                }
            }
        }

        if !preset.has(OUTPUT_MARKER) {
            args.push(output);
        }

        args
    }

    fn process(&self, args: Vec<String>) -> CliProcess {
        let process = CliProcess::new(&self.config.path)
            .args(args)
            .timeout_secs(self.config.timeout_secs)
            .stream_output(self.config.stream_output);
        match Regex::new(PROGRESS_PATTERN) {
            Ok(re) => process.progress_pattern(re),
            Err(_) => process,
        }
    }
}

#[async_trait]
impl Adapter for FfmpegAdapter {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "FFmpeg"
    }

    fn description(&self) -> &str {
        "Uses ffmpeg to convert and edit audio, video and image files."
    }

    fn context(&self) -> &AdapterContext {
        &self.context
    }

    async fn verify_environment(&self) -> Result<(), TranscodeError> {
        probe_executable(Self::KEY, &self.config.path, "-version").await
    }

    async fn transcode(
        &self,
        input: &FileDescriptor,
        preset: &Preset,
        output: &Path,
    ) -> Result<FileDescriptor, TranscodeError> {
        let args = self.build_args(input.path(), preset, output);
        self.process(args).run(&self.context).await?;
        FileDescriptor::inspect(output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::catalog;

    fn adapter() -> FfmpegAdapter {
        FfmpegAdapter::with_defaults().unwrap()
    }

    #[test]
    fn test_build_args_default_placement() {
        let preset = catalog::ffmpeg_sound_from_video().unwrap();
        let args = adapter().build_args(
            Path::new("/in/movie.avi"),
            &preset,
            Path::new("/out/a.mp3"),
        );
        assert_eq!(
            args,
            vec![
                "-y", "-i", "/in/movie.avi", "-vn", "-ar", "44100", "-ac", "2", "-ab", "192k",
                "-f", "mp3", "/out/a.mp3"
            ]
        );
    }

    #[test]
    fn test_build_args_marker_placement() {
        let preset = catalog::ffmpeg_avi_to_animated_gif().unwrap();
        let args = adapter().build_args(
            Path::new("/in/clip.avi"),
            &preset,
            Path::new("/out/clip.gif"),
        );
        assert_eq!(
            args,
            vec!["-y", "-i", "/in/clip.avi", "-pix_fmt", "rgb24", "/out/clip.gif"]
        );
    }

    #[test]
    fn test_build_args_extra_args() {
        let adapter = FfmpegAdapter::new(
            FfmpegConfig::default().with_extra_args(vec!["-hide_banner".to_string()]),
        )
        .unwrap();
        let preset = Preset::builder("ffmpeg.plain", "ffmpeg")
            .option("-b:a", 128)
            .build()
            .unwrap();
        let args = adapter.build_args(Path::new("/a.wav"), &preset, Path::new("/b.mp3"));
        assert_eq!(args, vec!["-y", "-hide_banner", "-i", "/a.wav", "-b:a", "128", "/b.mp3"]);
    }

    #[test]
    fn test_progress_pattern() {
        let re = Regex::new(PROGRESS_PATTERN).unwrap();
        assert!(re.is_match("frame=  120 fps= 30 q=28.0 size=  256kB time=00:00:04.00 speed=1x"));
        assert!(re.is_match("size=     512kB time=00:00:10.00 bitrate= 419.4kbits/s"));
        assert!(re.is_match("out_time_ms=4000000"));
        assert!(!re.is_match("Input #0, avi, from 'clip.avi':"));
    }

    #[test]
    fn test_config_defaults() {
        let config: FfmpegConfig = toml::from_str("").unwrap();
        assert_eq!(config, FfmpegConfig::default());
        assert_eq!(config.path, PathBuf::from("ffmpeg"));
        assert_eq!(config.timeout_secs, 3600);
    }

    #[tokio::test]
    async fn test_verify_missing_binary() {
        let adapter = FfmpegAdapter::new(
            FfmpegConfig::default().with_path("/nonexistent/ffmpeg"),
        )
        .unwrap();
        assert!(!adapter.verify().await);
        assert!(adapter
            .verification_error()
            .unwrap()
            .contains("executable not found"));
    }

    #[test]
    fn test_rejects_text_input() {
        let text = FileDescriptor::from_parts(
            "/in/a.txt",
            crate::file::FileKind::File,
            "text/plain; charset=us-ascii".parse().unwrap(),
        );
        assert!(adapter().validate_input_file(&text).is_err());
    }
}
