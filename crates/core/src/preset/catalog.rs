//! Builtin presets for the adapters shipped with this crate.
//!
//! Every preset returned here is locked.

use super::options::PresetOptions;
use super::preset::{OutputExtension, Preset};
use crate::error::TranscodeError;
use crate::file::{FileHandlerDefinition, FileKind};

/// Bitrates, in kb/s, of the `ffmpeg.audio_compression_<N>k` presets.
pub const AUDIO_COMPRESSION_BITRATES: [u32; 7] = [32, 96, 128, 160, 192, 256, 320];

/// MIME types HandBrakeCLI presets accept as input.
const HANDBRAKE_INPUT_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/x-ms-asf",
    "application/octet-stream",
    "video/x-msvideo",
    "video/x-flv",
    "audio/x-realaudio",
    "application/vnd.rn-realmedia",
    "video/x-ms-wmv",
];

/// Returns every builtin preset.
pub fn builtin_presets() -> Result<Vec<Preset>, TranscodeError> {
    let mut presets = vec![
        text_to_lower()?,
        text_to_upper()?,
        ffmpeg_sound_from_video()?,
    ];
    for bitrate in AUDIO_COMPRESSION_BITRATES {
        presets.push(ffmpeg_audio_compression(bitrate)?);
    }
    presets.push(ffmpeg_avi_to_animated_gif()?);
    presets.push(ffmpeg_convert_video()?);
    presets.push(handbrake_classic()?);
    presets.push(handbrake_normal()?);
    presets.push(handbrake_high_profile()?);
    Ok(presets)
}

fn options(pairs: &[(&str, &str)]) -> PresetOptions {
    pairs.iter().map(|&(k, v)| (k, v)).collect()
}

fn file_output() -> Result<FileHandlerDefinition, TranscodeError> {
    FileHandlerDefinition::builder()
        .required_type(FileKind::File)
        .build()
}

// Text

fn text_preset(key: &str, name: &str, func: &str) -> Result<Preset, TranscodeError> {
    Preset::builder(key, "text")
        .name(name)
        .description(format!("Rewrites the text of a file with the \"{func}\" transform."))
        .option("func", func)
        .input_definition(
            FileHandlerDefinition::builder()
                .allowed_mime_encodings(["us-ascii", "utf-8"])
                .required_type(FileKind::File)
                .build()?,
        )
        .output_definition(
            FileHandlerDefinition::builder()
                .required_type(FileKind::File)
                .inherit_input_extension(true)
                .build()?,
        )
        .locked(true)
        .build()
}

pub fn text_to_lower() -> Result<Preset, TranscodeError> {
    text_preset("text.to_lower", "Text to lower case", "lower")
}

pub fn text_to_upper() -> Result<Preset, TranscodeError> {
    text_preset("text.to_upper", "Text to upper case", "upper")
}

// FFmpeg

fn ffmpeg_input() -> Result<FileHandlerDefinition, TranscodeError> {
    FileHandlerDefinition::builder()
        .required_type(FileKind::File)
        .build()
}

pub fn ffmpeg_sound_from_video() -> Result<Preset, TranscodeError> {
    Preset::builder("ffmpeg.sound_from_video", "ffmpeg")
        .name("Sound from Video Preset")
        .description("Extracts the audio track of a video into an mp3 file.")
        .options(options(&[
            ("-vn", ""),
            ("-ar", "44100"),
            ("-ac", "2"),
            ("-ab", "192k"),
            ("-f", "mp3"),
        ]))
        .input_definition(ffmpeg_input()?)
        .output_definition(
            FileHandlerDefinition::builder()
                .required_type(FileKind::File)
                .required_extension("mp3")
                .build()?,
        )
        .locked(true)
        .build()
}

/// Audio compression to a fixed bitrate. The output extension comes from the
/// caller's output path.
pub fn ffmpeg_audio_compression(bitrate_kbps: u32) -> Result<Preset, TranscodeError> {
    Preset::builder(format!("ffmpeg.audio_compression_{bitrate_kbps}k"), "ffmpeg")
        .name(format!("Audio Compression {bitrate_kbps}k Preset"))
        .description(format!(
            "Compresses an audio file to a bitrate of {bitrate_kbps}kb/s."
        ))
        .option("-ab", format!("{bitrate_kbps}k"))
        .input_definition(ffmpeg_input()?)
        .output_definition(file_output()?)
        .locked(true)
        .build()
}

pub fn ffmpeg_avi_to_animated_gif() -> Result<Preset, TranscodeError> {
    Preset::builder("ffmpeg.avi_to_animated_gif", "ffmpeg")
        .name("Avi To Animated Gif Preset")
        .description("Turns an avi video into an animated gif.")
        .options(options(&[("-i", ""), ("-pix_fmt", "rgb24"), ("-o", "")]))
        .input_definition(
            FileHandlerDefinition::builder()
                .required_type(FileKind::File)
                .allowed_extensions(["avi"])
                .build()?,
        )
        .output_definition(
            FileHandlerDefinition::builder()
                .required_type(FileKind::File)
                .required_extension("gif")
                .build()?,
        )
        .locked(true)
        .build()
}

/// Container/codec conversion driven by the input and output extensions.
pub fn ffmpeg_convert_video() -> Result<Preset, TranscodeError> {
    Preset::builder("ffmpeg.convert_video", "ffmpeg")
        .name("Convert Video Preset")
        .description("Converts a video to the format implied by the output file extension.")
        .options(options(&[("-i", ""), ("-o", "")]))
        .input_definition(ffmpeg_input()?)
        .output_definition(file_output()?)
        .output_extension(OutputExtension::Unspecified)
        .locked(true)
        .build()
}

// HandBrake

fn handbrake_preset(
    key: &str,
    name: &str,
    description: &str,
    pairs: &[(&str, &str)],
) -> Result<Preset, TranscodeError> {
    Preset::builder(key, "handbrake")
        .name(name)
        .description(description)
        .options(options(pairs))
        .input_definition(
            FileHandlerDefinition::builder()
                .allowed_mime_types(HANDBRAKE_INPUT_MIME_TYPES.iter().copied())
                .allowed_mime_encodings(["binary"])
                .required_type(FileKind::File)
                .build()?,
        )
        .output_definition(
            FileHandlerDefinition::builder()
                .required_type(FileKind::File)
                .required_extension("mp4")
                .build()?,
        )
        .locked(true)
        .build()
}

pub fn handbrake_classic() -> Result<Preset, TranscodeError> {
    handbrake_preset(
        "handbrake.classic",
        "Classic Preset",
        "HandBrake's traditional, faster, lower-quality settings.",
        &[
            ("video-library-encoder", "x264"),
            ("video-bitrate", "1000"),
            ("select-audio-tracks", "1"),
            ("audio-encoder", "faac"),
            ("audio-bitrate", "160"),
            ("surround-sound-downmixing", "dpl2"),
            ("audio-samplerate", "Auto"),
            ("dynamic-range-compression", "0.0"),
            ("format", "mp4"),
        ],
    )
}

pub fn handbrake_normal() -> Result<Preset, TranscodeError> {
    handbrake_preset(
        "handbrake.normal",
        "Normal Preset",
        "HandBrake's default settings for H.264 video.",
        &[
            ("video-library-encoder", "x264"),
            ("video-quality", "20"),
            ("select-audio-tracks", "1"),
            ("audio-encoder", "faac"),
            ("audio-bitrate", "160"),
            ("surround-sound-downmixing", "dpl2"),
            ("audio-samplerate", "Auto"),
            ("dynamic-range-compression", "0.0"),
            ("format", "mp4"),
            ("strict-anamorphic-pixel-aspect-ratio", ""),
            ("add-chapter-markers", ""),
            (
                "advanced-encoder-options",
                "ref=2:bframes=2:subme=6:mixed-refs=0:weightb=0:8x8dct=0:trellis=0",
            ),
        ],
    )
}

pub fn handbrake_high_profile() -> Result<Preset, TranscodeError> {
    handbrake_preset(
        "handbrake.high_profile",
        "High Profile Preset",
        "HandBrake's general-purpose preset for High Profile H.264 video.",
        &[
            ("video-library-encoder", "x264"),
            ("video-quality", "20"),
            ("select-audio-tracks", "1,1"),
            ("audio-encoder", "faac,copy:ac3"),
            ("audio-bitrate", "160,160"),
            ("surround-sound-downmixing", "dpl2,auto"),
            ("audio-samplerate", "Auto,Auto"),
            ("dynamic-range-compression", "0.0,0.0"),
            ("format", "mp4"),
            ("detelecine-video-with-pullup-filter", ""),
            ("deinterlace-when-detects-combing", ""),
            ("loose-anamorphic-pixel-aspect-ratio", ""),
            ("add-chapter-markers", ""),
            ("advanced-encoder-options", "b-adapt=2:rc-lookahead=50"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_presets_are_unique_and_locked() {
        let presets = builtin_presets().unwrap();
        assert_eq!(presets.len(), 3 + AUDIO_COMPRESSION_BITRATES.len() + 5);

        let keys: HashSet<&str> = presets.iter().map(|p| p.key()).collect();
        assert_eq!(keys.len(), presets.len());
        assert!(keys.contains("ffmpeg.audio_compression_320k"));
        assert!(presets.iter().all(|p| p.is_locked()));
    }

    #[test]
    fn test_builtin_adapters() {
        for preset in builtin_presets().unwrap() {
            let prefix = preset.key().split('.').next().unwrap().to_string();
            assert_eq!(preset.required_adapter(), prefix);
        }
    }

    #[test]
    fn test_audio_compression_options() {
        let preset = ffmpeg_audio_compression(128).unwrap();
        assert_eq!(preset.key(), "ffmpeg.audio_compression_128k");
        assert_eq!(preset.get_str("-ab"), Some("128k"));
    }

    #[test]
    fn test_handbrake_output_is_mp4() {
        let preset = handbrake_normal().unwrap();
        assert_eq!(preset.output_definition().required_extension(), Some("mp4"));
        assert!(!preset.output_definition().allow_directory);
        let keys: Vec<&str> = preset.options().keys().collect();
        assert_eq!(keys.first(), Some(&"video-library-encoder"));
    }
}
