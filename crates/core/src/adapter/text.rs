//! Adapter that rewrites the case of text files.

use async_trait::async_trait;
use std::path::Path;

use super::context::AdapterContext;
use super::traits::Adapter;
use crate::error::TranscodeError;
use crate::file::{FileDescriptor, FileHandlerDefinition, BINARY_CHARSET};
use crate::preset::Preset;

/// Preset option naming the transform to apply.
pub const FUNC_OPTION: &str = "func";

/// Case transform applied by [`TextAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTransform {
    Lower,
    Upper,
    /// Upper-cases the first letter of every word.
    Words,
}

impl TextTransform {
    pub const NAMES: [&'static str; 3] = ["lower", "upper", "words"];

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "lower" => Some(Self::Lower),
            "upper" => Some(Self::Upper),
            "words" => Some(Self::Words),
            _ => None,
        }
    }

    pub fn apply(&self, text: &str) -> String {
        match self {
            Self::Lower => text.to_lowercase(),
            Self::Upper => text.to_uppercase(),
            Self::Words => {
                let mut out = String::with_capacity(text.len());
                let mut at_word_start = true;
                for c in text.chars() {
                    if at_word_start && !c.is_whitespace() {
                        out.extend(c.to_uppercase());
                    } else {
                        out.push(c);
                    }
                    at_word_start = c.is_whitespace();
                }
                out
            }
        }
    }
}

/// Rewrites text files with a [`TextTransform`] chosen by the preset's `func` option.
#[derive(Debug)]
pub struct TextAdapter {
    context: AdapterContext,
}

impl TextAdapter {
    pub const KEY: &'static str = "text";

    pub fn new() -> Result<Self, TranscodeError> {
        let input = FileHandlerDefinition::builder()
            .rejected_mime_encodings([BINARY_CHARSET])
            .build()?;
        Ok(Self {
            context: AdapterContext::new(Self::KEY).with_input_definition(input),
        })
    }

    fn transform(&self, preset: &Preset) -> Result<TextTransform, TranscodeError> {
        let name = preset.get_str(FUNC_OPTION).ok_or_else(|| {
            TranscodeError::invalid_preset(format!("\"{FUNC_OPTION}\" is a required preset option"))
        })?;
        TextTransform::parse(name).ok_or_else(|| {
            TranscodeError::invalid_preset(format!(
                "\"{FUNC_OPTION}\" must be one of: {}",
                TextTransform::NAMES.join(", ")
            ))
        })
    }
}

#[async_trait]
impl Adapter for TextAdapter {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "Text"
    }

    fn description(&self) -> &str {
        "Rewrites the case of text files."
    }

    fn context(&self) -> &AdapterContext {
        &self.context
    }

    fn validate_preset(&self, preset: &Preset) -> Result<(), TranscodeError> {
        self.transform(preset).map(|_| ())
    }

    async fn transcode(
        &self,
        input: &FileDescriptor,
        preset: &Preset,
        output: &Path,
    ) -> Result<FileDescriptor, TranscodeError> {
        let transform = self.transform(preset)?;
        let text = tokio::fs::read_to_string(input.path()).await.map_err(|e| {
            TranscodeError::transcode_failed(
                Self::KEY,
                format!("could not read {}: {e}", input.path().display()),
                None,
            )
        })?;

        tokio::fs::write(output, transform.apply(&text))
            .await
            .map_err(|e| {
                TranscodeError::transcode_failed(
                    Self::KEY,
                    format!("could not write {}: {e}", output.display()),
                    None,
                )
            })?;

        self.context
            .debug(format!("Applied {transform:?} to {}", input.path().display()));
        FileDescriptor::inspect(output).await
    }
}
