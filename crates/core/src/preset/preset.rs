//! Preset definition and output path generation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::options::{OptionValue, PresetOptions};
use crate::error::TranscodeError;
use crate::file::naming::{
    final_segment, normalize_extension, split_extension, strip_extension, trim_trailing_separators,
};
use crate::file::{FileDescriptor, FileHandlerDefinition};

/// Description used when a preset does not provide one.
pub const DEFAULT_DESCRIPTION: &str = "No description provided.";

/// Key of presets built on the fly by `Transcoder::transcode_with_adapter`.
pub const DYNAMIC_PRESET_KEY: &str = "dynamic";

/// How a preset picks the output extension when its output definition neither
/// requires nor inherits one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value", rename_all = "snake_case")]
pub enum OutputExtension {
    /// No extension can be derived; callers must pass an output path with one.
    #[default]
    Unspecified,
    /// Always use this extension.
    Fixed(String),
    /// Use the text value of the named option.
    FromOption(String),
}

/// A named bundle of adapter options plus input/output file rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    description: String,
    required_adapter: String,
    options: PresetOptions,
    input_definition: FileHandlerDefinition,
    output_definition: FileHandlerDefinition,
    #[serde(default)]
    output_extension: OutputExtension,
    #[serde(default)]
    locked: bool,
}

impl Preset {
    /// Creates an unlocked preset with no options that accepts any input and output.
    pub fn new(
        key: impl Into<String>,
        required_adapter: impl Into<String>,
    ) -> Result<Self, TranscodeError> {
        Self::builder(key, required_adapter).build()
    }

    pub fn builder(key: impl Into<String>, required_adapter: impl Into<String>) -> PresetBuilder {
        PresetBuilder::new(key, required_adapter)
    }

    /// Creates the preset used to run an adapter directly with ad-hoc options.
    pub fn dynamic(
        required_adapter: impl Into<String>,
        options: PresetOptions,
    ) -> Result<Self, TranscodeError> {
        Self::builder(DYNAMIC_PRESET_KEY, required_adapter)
            .options(options)
            .build()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the display name, falling back to the key.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.key)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn required_adapter(&self) -> &str {
        &self.required_adapter
    }

    pub fn input_definition(&self) -> &FileHandlerDefinition {
        &self.input_definition
    }

    pub fn output_definition(&self) -> &FileHandlerDefinition {
        &self.output_definition
    }

    pub fn output_extension(&self) -> &OutputExtension {
        &self.output_extension
    }

    /// Whether this preset produces a directory rather than a file.
    pub fn outputs_directory(&self) -> bool {
        self.output_definition.requires_directory()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Prevents any further change to options or definitions. Idempotent.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    // Options

    pub fn options(&self) -> &PresetOptions {
        &self.options
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(OptionValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.options.get(key).and_then(OptionValue::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(OptionValue::as_bool)
    }

    pub fn has(&self, key: &str) -> bool {
        self.options.contains(key)
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Result<&mut Self, TranscodeError> {
        self.ensure_unlocked()?;
        self.options.insert(key, value);
        Ok(self)
    }

    pub fn remove(&mut self, key: &str) -> Result<&mut Self, TranscodeError> {
        self.ensure_unlocked()?;
        self.options.remove(key);
        Ok(self)
    }

    /// Replaces all options at once.
    pub fn set_options(&mut self, options: PresetOptions) -> Result<&mut Self, TranscodeError> {
        self.ensure_unlocked()?;
        self.options = options;
        Ok(self)
    }

    pub fn set_input_definition(
        &mut self,
        definition: FileHandlerDefinition,
    ) -> Result<&mut Self, TranscodeError> {
        self.ensure_unlocked()?;
        definition.check()?;
        self.input_definition = definition;
        Ok(self)
    }

    pub fn set_output_definition(
        &mut self,
        definition: FileHandlerDefinition,
    ) -> Result<&mut Self, TranscodeError> {
        self.ensure_unlocked()?;
        definition.check()?;
        self.output_definition = definition;
        Ok(self)
    }

    fn ensure_unlocked(&self) -> Result<(), TranscodeError> {
        if self.locked {
            return Err(TranscodeError::PresetLocked {
                key: self.key.clone(),
            });
        }
        Ok(())
    }

    // File rules

    pub fn validate_input_file(&self, file: &FileDescriptor) -> Result<(), TranscodeError> {
        self.input_definition.validate(file)
    }

    pub fn validate_output_file(&self, file: &FileDescriptor) -> Result<(), TranscodeError> {
        self.output_definition.validate(file)
    }

    pub fn accepts_input_file(&self, file: &FileDescriptor) -> bool {
        self.input_definition.accepts(file)
    }

    pub fn accepts_output_file(&self, file: &FileDescriptor) -> bool {
        self.output_definition.accepts(file)
    }

    /// Computes the candidate output path for `input`.
    ///
    /// Without a caller path the output lands next to the input as
    /// `<base>.<key>.<ext>`, or as a `<key>` directory for directory presets.
    /// A caller path whose final segment has no extension is treated as the
    /// directory to place a generated file name into. Caller paths that
    /// contradict the output definition fail with
    /// [`InvalidInput`](TranscodeError::InvalidInput).
    pub fn generate_output_path(
        &self,
        input: &FileDescriptor,
        user_path: Option<&Path>,
    ) -> Result<PathBuf, TranscodeError> {
        let input_dir = if input.is_dir() {
            input.path().to_path_buf()
        } else {
            input
                .path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| input.path().to_path_buf())
        };

        let Some(user_path) = user_path else {
            if self.outputs_directory() {
                return Ok(input_dir.join(&self.key));
            }
            return Ok(input_dir.join(self.generated_file_name(input)?));
        };

        let user_path = trim_trailing_separators(user_path);
        let name = final_segment(&user_path);
        let given_extension = split_extension(&name).map(|(_, ext)| ext.to_lowercase());

        if self.outputs_directory() {
            if given_extension.is_some() {
                return Err(TranscodeError::invalid_input(format!(
                    "preset {} outputs a directory, the output path must not have a file extension",
                    self.key
                )));
            }
            return Ok(user_path);
        }

        match given_extension {
            Some(ext) => {
                if self.output_definition.inherit_input_extension && ext != input.extension() {
                    return Err(TranscodeError::invalid_input(format!(
                        "preset {} requires the output extension to match the input extension \"{}\"",
                        self.key,
                        input.extension()
                    )));
                }
                if !self.output_definition.accepts_extension(&ext) {
                    return Err(TranscodeError::invalid_input(format!(
                        "preset {} cannot output files with extension \"{ext}\"",
                        self.key
                    )));
                }
                Ok(user_path)
            }
            None => Ok(user_path.join(self.generated_file_name(input)?)),
        }
    }

    /// Resolves the extension of generated output file names.
    pub fn resolve_output_extension(
        &self,
        input: &FileDescriptor,
    ) -> Result<String, TranscodeError> {
        if let Some(ext) = self.output_definition.required_extension() {
            return Ok(ext.to_string());
        }
        if self.output_definition.inherit_input_extension {
            return Ok(input.extension().to_string());
        }
        match &self.output_extension {
            OutputExtension::Fixed(ext) => Ok(normalize_extension(ext)),
            OutputExtension::FromOption(option) => self
                .get_str(option)
                .filter(|ext| !ext.is_empty())
                .map(normalize_extension)
                .ok_or_else(|| {
                    TranscodeError::invalid_preset(format!(
                        "preset {} takes its output extension from option \"{option}\", which is not set",
                        self.key
                    ))
                }),
            OutputExtension::Unspecified => Err(TranscodeError::invalid_preset(format!(
                "preset {} cannot determine an output extension, pass an output path with one",
                self.key
            ))),
        }
    }

    fn generated_file_name(&self, input: &FileDescriptor) -> Result<String, TranscodeError> {
        let ext = self.resolve_output_extension(input)?;
        let file_name = input.file_name();
        let base = strip_extension(&file_name);
        Ok(format!("{base}.{}.{ext}", self.key))
    }

    // Codec

    /// Encodes the preset, including its option order and lock state, as JSON.
    pub fn encode(&self) -> Result<String, TranscodeError> {
        serde_json::to_string(self)
            .map_err(|e| TranscodeError::invalid_preset(format!("failed to encode preset: {e}")))
    }

    /// Decodes a preset produced by [`encode`](Self::encode), re-checking its
    /// key fields and definitions.
    pub fn decode(data: &str) -> Result<Self, TranscodeError> {
        let preset: Self = serde_json::from_str(data)
            .map_err(|e| TranscodeError::invalid_preset(format!("failed to decode preset: {e}")))?;
        check_keys(&preset.key, &preset.required_adapter)?;
        preset.input_definition.check()?;
        preset.output_definition.check()?;
        Ok(preset)
    }
}

fn check_keys(key: &str, required_adapter: &str) -> Result<(), TranscodeError> {
    if key.trim().is_empty() {
        return Err(TranscodeError::invalid_preset(
            "presets require a non-empty key",
        ));
    }
    if required_adapter.trim().is_empty() {
        return Err(TranscodeError::invalid_preset(format!(
            "preset {key} must declare its required adapter"
        )));
    }
    Ok(())
}

/// Builder for [`Preset`].
#[derive(Debug, Clone)]
pub struct PresetBuilder {
    key: String,
    name: Option<String>,
    description: Option<String>,
    required_adapter: String,
    options: PresetOptions,
    input_definition: FileHandlerDefinition,
    output_definition: FileHandlerDefinition,
    output_extension: OutputExtension,
    locked: bool,
}

impl PresetBuilder {
    fn new(key: impl Into<String>, required_adapter: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            description: None,
            required_adapter: required_adapter.into(),
            options: PresetOptions::new(),
            input_definition: FileHandlerDefinition::any(),
            output_definition: FileHandlerDefinition::any(),
            output_extension: OutputExtension::Unspecified,
            locked: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key, value);
        self
    }

    pub fn options(mut self, options: PresetOptions) -> Self {
        self.options = options;
        self
    }

    pub fn input_definition(mut self, definition: FileHandlerDefinition) -> Self {
        self.input_definition = definition;
        self
    }

    pub fn output_definition(mut self, definition: FileHandlerDefinition) -> Self {
        self.output_definition = definition;
        self
    }

    pub fn output_extension(mut self, strategy: OutputExtension) -> Self {
        self.output_extension = strategy;
        self
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Builds the preset, failing with [`InvalidPreset`](TranscodeError::InvalidPreset)
    /// if the key or required adapter is empty, or with
    /// [`InvalidDefinition`](TranscodeError::InvalidDefinition) for contradictory definitions.
    pub fn build(self) -> Result<Preset, TranscodeError> {
        check_keys(&self.key, &self.required_adapter)?;
        self.input_definition.check()?;
        self.output_definition.check()?;
        Ok(Preset {
            key: self.key,
            name: self.name,
            description: self
                .description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            required_adapter: self.required_adapter,
            options: self.options,
            input_definition: self.input_definition,
            output_definition: self.output_definition,
            output_extension: self.output_extension,
            locked: self.locked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileKind;
    use proptest::prelude::*;

    fn input_file() -> FileDescriptor {
        FileDescriptor::from_parts(
            "/media/in/Holiday.AVI",
            FileKind::File,
            "text/plain; charset=us-ascii".parse().unwrap(),
        )
    }

    fn dummy() -> PresetBuilder {
        Preset::builder("test_preset", "test_adapter")
            .output_extension(OutputExtension::Fixed("avi".to_string()))
    }

    fn with_output(definition: FileHandlerDefinition) -> Preset {
        dummy().output_definition(definition).build().unwrap()
    }

    fn mp3_output() -> Preset {
        with_output(
            FileHandlerDefinition::builder()
                .required_extension("mp3")
                .build()
                .unwrap(),
        )
    }

    fn directory_output() -> Preset {
        with_output(
            FileHandlerDefinition::builder()
                .required_type(FileKind::Directory)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_construction_requires_key_and_adapter() {
        assert!(Preset::new("name", "adapter").is_ok());
        assert!(matches!(
            Preset::new("", "adapter"),
            Err(TranscodeError::InvalidPreset(_))
        ));
        assert!(matches!(
            Preset::new("foo", " "),
            Err(TranscodeError::InvalidPreset(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let preset = Preset::new("name", "adapter").unwrap();
        assert_eq!(preset.key(), "name");
        assert_eq!(preset.name(), "name");
        assert_eq!(preset.required_adapter(), "adapter");
        assert_eq!(preset.description(), DEFAULT_DESCRIPTION);
        assert_eq!(preset.input_definition(), &FileHandlerDefinition::any());
        assert!(!preset.is_locked());

        let named = Preset::builder("name", "adapter")
            .name("Pretty")
            .build()
            .unwrap();
        assert_eq!(named.name(), "Pretty");
    }

    #[test]
    fn test_set_get_has_remove() {
        let mut preset = Preset::new("name", "adapter").unwrap();
        assert!(!preset.has("foo"));
        assert_eq!(preset.get_str("foo").unwrap_or("bar"), "bar");

        preset.set("foo", "baz").unwrap();
        assert!(preset.has("foo"));
        assert_eq!(preset.get_str("foo"), Some("baz"));

        preset.remove("foo").unwrap();
        assert!(!preset.has("foo"));
    }

    #[test]
    fn test_locked_preset_rejects_mutation() {
        let mut preset = Preset::new("name", "adapter").unwrap();
        preset.set("foo", "bar").unwrap().lock();
        preset.lock();
        assert!(preset.is_locked());

        assert!(matches!(
            preset.remove("foo"),
            Err(TranscodeError::PresetLocked { .. })
        ));
        assert!(preset.set("foo", "bazzz").is_err());
        assert!(preset.set_options(PresetOptions::new()).is_err());
        assert!(preset
            .set_output_definition(FileHandlerDefinition::any())
            .is_err());
        assert_eq!(preset.get_str("foo"), Some("bar"));
    }

    #[test]
    fn test_set_options_and_typed_getters() {
        let mut preset = Preset::new("name", "adapter").unwrap();
        let options: PresetOptions = [
            ("foo", OptionValue::from("bar")),
            ("baz", OptionValue::from(false)),
            ("rate", OptionValue::from("44100")),
        ]
        .into_iter()
        .collect();
        preset.set_options(options).unwrap();

        assert_eq!(preset.get_str("foo"), Some("bar"));
        assert_eq!(preset.get_bool("baz"), Some(false));
        assert_eq!(preset.get_i64("rate"), Some(44100));
        assert_eq!(preset.get_i64("foo"), None);
    }

    #[test]
    fn test_accepts_files_by_default() {
        let preset = dummy().build().unwrap();
        let dir = FileDescriptor::from_parts(
            "/media/in",
            FileKind::Directory,
            "inode/directory; charset=binary".parse().unwrap(),
        );
        assert!(preset.accepts_input_file(&input_file()));
        assert!(preset.accepts_input_file(&dir));
        assert!(preset.accepts_output_file(&input_file()));
        assert!(preset.accepts_output_file(&dir));
    }

    #[test]
    fn test_generate_next_to_input() {
        let preset = dummy().build().unwrap();
        let path = preset.generate_output_path(&input_file(), None).unwrap();
        assert_eq!(path, PathBuf::from("/media/in/Holiday.test_preset.avi"));
    }

    #[test]
    fn test_generate_into_given_directory() {
        let preset = dummy().build().unwrap();
        let path = preset
            .generate_output_path(&input_file(), Some(Path::new("/media/in")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/media/in/Holiday.test_preset.avi"));
    }

    #[test]
    fn test_generate_keeps_full_user_path() {
        let preset = dummy().build().unwrap();
        let path = preset
            .generate_output_path(&input_file(), Some(Path::new("/tmp/test.avi")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/test.avi"));
    }

    #[test]
    fn test_generate_rejects_unaccepted_extension() {
        let result =
            mp3_output().generate_output_path(&input_file(), Some(Path::new("/foo/stuff.mp4")));
        assert!(matches!(result, Err(TranscodeError::InvalidInput(_))));
    }

    #[test]
    fn test_generate_with_required_extension_into_directory() {
        let preset = mp3_output();
        for user_path in ["/foo/", "/foo"] {
            let path = preset
                .generate_output_path(&input_file(), Some(Path::new(user_path)))
                .unwrap();
            assert_eq!(path, PathBuf::from("/foo/Holiday.test_preset.mp3"));
        }

        let path = preset
            .generate_output_path(&input_file(), Some(Path::new("/foo/../")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/foo/../Holiday.test_preset.mp3"));
    }

    #[test]
    fn test_generate_without_extension_strategy_fails() {
        let preset = Preset::new("no_ext", "adapter").unwrap();
        let result = preset.generate_output_path(&input_file(), Some(Path::new("/media/in")));
        assert!(matches!(result, Err(TranscodeError::InvalidPreset(_))));

        // An explicit extension needs no strategy.
        let path = preset
            .generate_output_path(&input_file(), Some(Path::new("/out/x.ogg")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/out/x.ogg"));
    }

    #[test]
    fn test_generate_extension_from_option() {
        let preset = Preset::builder("ffmpeg.custom", "ffmpeg")
            .option("-f", "MP3")
            .output_extension(OutputExtension::FromOption("-f".to_string()))
            .build()
            .unwrap();
        let path = preset.generate_output_path(&input_file(), None).unwrap();
        assert_eq!(path, PathBuf::from("/media/in/Holiday.ffmpeg.custom.mp3"));
    }

    #[test]
    fn test_generate_inherited_extension() {
        let preset = with_output(
            FileHandlerDefinition::builder()
                .inherit_input_extension(true)
                .build()
                .unwrap(),
        );
        let movie = FileDescriptor::from_parts(
            "/a/b.mov",
            FileKind::File,
            "video/quicktime; charset=binary".parse().unwrap(),
        );
        let path = preset.generate_output_path(&movie, None).unwrap();
        assert_eq!(path, PathBuf::from("/a/b.test_preset.mov"));

        let result = preset.generate_output_path(&movie, Some(Path::new("/a/c.mp4")));
        assert!(matches!(result, Err(TranscodeError::InvalidInput(_))));
        assert!(preset
            .generate_output_path(&movie, Some(Path::new("/a/c.MOV")))
            .is_ok());
    }

    #[test]
    fn test_generate_directory_output() {
        let preset = directory_output();
        let path = preset.generate_output_path(&input_file(), None).unwrap();
        assert_eq!(path, PathBuf::from("/media/in/test_preset"));

        let path = preset
            .generate_output_path(&input_file(), Some(Path::new("/foo/somedir")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/foo/somedir"));

        let path = preset
            .generate_output_path(&input_file(), Some(Path::new("../../stuff")))
            .unwrap();
        assert_eq!(path, PathBuf::from("../../stuff"));

        let path = preset
            .generate_output_path(&input_file(), Some(Path::new("/foo/..")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/foo/.."));

        let result = preset.generate_output_path(&input_file(), Some(Path::new("/foo.mp3")));
        assert!(matches!(result, Err(TranscodeError::InvalidInput(_))));
    }

    #[test]
    fn test_generate_from_directory_input() {
        let preset = directory_output();
        let dir = FileDescriptor::from_parts(
            "/media/album",
            FileKind::Directory,
            "inode/directory; charset=binary".parse().unwrap(),
        );
        let path = preset.generate_output_path(&dir, None).unwrap();
        assert_eq!(path, PathBuf::from("/media/album/test_preset"));
    }

    #[test]
    fn test_codec_preserves_options_and_lock() {
        let mut preset = Preset::builder("handbrake.custom", "handbrake")
            .description("Custom")
            .option("format", "mp4")
            .option("video-quality", 20)
            .option("add-chapter-markers", "")
            .output_extension(OutputExtension::Fixed("mp4".to_string()))
            .build()
            .unwrap();
        preset.lock();

        let decoded = Preset::decode(&preset.encode().unwrap()).unwrap();
        assert_eq!(decoded, preset);
        let keys: Vec<&str> = decoded.options().keys().collect();
        assert_eq!(keys, vec!["format", "video-quality", "add-chapter-markers"]);
        assert!(decoded.is_locked());
    }

    #[test]
    fn test_decode_rejects_missing_key() {
        let data = Preset::new("x", "adapter")
            .unwrap()
            .encode()
            .unwrap()
            .replace("\"key\":\"x\"", "\"key\":\"\"");
        assert!(matches!(
            Preset::decode(&data),
            Err(TranscodeError::InvalidPreset(_))
        ));
        assert!(Preset::decode("not json").is_err());
    }

    #[test]
    fn test_decode_rejects_contradictory_definition() {
        let preset = Preset::builder("frames", "adapter")
            .output_definition(
                FileHandlerDefinition::builder()
                    .required_type(FileKind::Directory)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let mut value: serde_json::Value =
            serde_json::from_str(&preset.encode().unwrap()).unwrap();
        value["output_definition"]["extension"]["required"] = "mp4".into();

        assert!(matches!(
            Preset::decode(&value.to_string()),
            Err(TranscodeError::InvalidDefinition(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_generate_output_path_is_deterministic(
            base in "[a-zA-Z0-9_]{1,10}",
            ext in "[a-z0-9]{1,4}",
            user in proptest::option::of("/[a-z]{1,8}(/[a-z]{1,8})?"),
        ) {
            let preset = dummy().build().unwrap();
            let input = FileDescriptor::from_parts(
                format!("/data/{base}.{ext}"),
                FileKind::File,
                "application/octet-stream; charset=binary".parse().unwrap(),
            );
            let user_path = user.as_deref().map(Path::new);
            let first = preset.generate_output_path(&input, user_path).unwrap();
            let second = preset.generate_output_path(&input, user_path).unwrap();
            prop_assert_eq!(&first, &second);
            let expected_name = format!("{base}.test_preset.avi");
            prop_assert_eq!(final_segment(&first), expected_name);
        }
    }
}
