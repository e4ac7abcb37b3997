//! Declarative accept/reject rules for files.

use serde::{Deserialize, Serialize};

use super::descriptor::{FileDescriptor, FileKind};
use super::naming::normalize_extension;
use crate::error::TranscodeError;

/// A single accept/reject rule over one file attribute.
///
/// A required value wins over the allow-list, which wins over the deny-list.
/// An empty criterion accepts anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criterion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

impl Criterion {
    /// Returns true if no rule is set.
    pub fn is_empty(&self) -> bool {
        self.required.is_none() && self.allowed.is_empty() && self.rejected.is_empty()
    }

    /// Checks a normalized candidate value, returning the failure reason.
    fn check(&self, attribute: &str, candidate: &str) -> Result<(), String> {
        if let Some(required) = &self.required {
            if candidate != required {
                return Err(format!(
                    "{attribute} \"{candidate}\" does not match required \"{required}\""
                ));
            }
        } else if !self.allowed.is_empty() {
            if !self.allowed.iter().any(|v| v == candidate) {
                return Err(format!(
                    "{attribute} \"{candidate}\" is not one of [{}]",
                    self.allowed.join(", ")
                ));
            }
        } else if self.rejected.iter().any(|v| v == candidate) {
            return Err(format!("{attribute} \"{candidate}\" is rejected"));
        }
        Ok(())
    }
}

/// Accept/reject rules for the input or output side of a preset or adapter.
///
/// Extensions are compared lower-cased and without dots, MIME values lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileHandlerDefinition {
    pub extension: Criterion,
    pub mime_full: Criterion,
    pub mime_type: Criterion,
    pub mime_encoding: Criterion,
    pub allow_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_type: Option<FileKind>,
    /// Output side only: the output extension is the input file's extension.
    pub inherit_input_extension: bool,
}

impl Default for FileHandlerDefinition {
    fn default() -> Self {
        Self {
            extension: Criterion::default(),
            mime_full: Criterion::default(),
            mime_type: Criterion::default(),
            mime_encoding: Criterion::default(),
            allow_directory: true,
            required_type: None,
            inherit_input_extension: false,
        }
    }
}

impl FileHandlerDefinition {
    /// A definition that accepts every file and directory.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn builder() -> FileHandlerDefinitionBuilder {
        FileHandlerDefinitionBuilder::default()
    }

    /// Returns the required extension, if any.
    pub fn required_extension(&self) -> Option<&str> {
        self.extension.required.as_deref()
    }

    /// Rejects contradictory criteria: a required directory that also has a
    /// required extension, or that directories are not allowed for.
    pub fn check(&self) -> Result<(), TranscodeError> {
        if !self.requires_directory() {
            return Ok(());
        }
        if let Some(ext) = &self.extension.required {
            return Err(TranscodeError::InvalidDefinition(format!(
                "a directory cannot have required extension \"{ext}\""
            )));
        }
        if !self.allow_directory {
            return Err(TranscodeError::InvalidDefinition(
                "directory required but directories are not allowed".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether this definition requires its file to be a directory.
    pub fn requires_directory(&self) -> bool {
        self.required_type == Some(FileKind::Directory)
    }

    /// Whether directories pass this definition's directory rule.
    ///
    /// A required extension always excludes directories.
    pub fn allows_directory(&self) -> bool {
        self.allow_directory && self.extension.required.is_none()
    }

    /// Checks `file` against every criterion, first failure wins.
    pub fn validate(&self, file: &FileDescriptor) -> Result<(), TranscodeError> {
        let fail = |reason: String| TranscodeError::invalid_file(file.path(), reason);

        self.extension
            .check("extension", file.extension())
            .map_err(fail)?;
        self.mime_full
            .check("MIME", &file.mime().to_string().to_lowercase())
            .map_err(fail)?;
        self.mime_type
            .check("MIME type", &file.mime_type().to_lowercase())
            .map_err(fail)?;
        self.mime_encoding
            .check("MIME encoding", &file.mime_encoding().to_lowercase())
            .map_err(fail)?;

        if let Some(required) = self.required_type {
            if file.kind() != required {
                return Err(fail(format!(
                    "expected a {required}, found a {}",
                    file.kind()
                )));
            }
        }

        if file.is_dir() && !self.allows_directory() {
            return Err(fail("directories are not allowed".to_string()));
        }

        Ok(())
    }

    /// Returns true if `file` passes [`validate`](Self::validate).
    pub fn accepts(&self, file: &FileDescriptor) -> bool {
        self.validate(file).is_ok()
    }

    /// Returns true if the extension criterion accepts `ext`.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extension
            .check("extension", &normalize_extension(ext))
            .is_ok()
    }
}

/// Builder for [`FileHandlerDefinition`] that normalizes values and rejects
/// contradictory combinations.
#[derive(Debug, Clone, Default)]
pub struct FileHandlerDefinitionBuilder {
    definition: FileHandlerDefinition,
}

fn collect<I, S>(values: I, normalize: fn(&str) -> String) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values.into_iter().map(|v| normalize(v.as_ref())).collect()
}

fn lower(value: &str) -> String {
    value.trim().to_lowercase()
}

impl FileHandlerDefinitionBuilder {
    pub fn required_extension(mut self, ext: &str) -> Self {
        self.definition.extension.required = Some(normalize_extension(ext));
        self
    }

    pub fn allowed_extensions<I: IntoIterator<Item = S>, S: AsRef<str>>(mut self, exts: I) -> Self {
        self.definition.extension.allowed = collect(exts, normalize_extension);
        self
    }

    pub fn rejected_extensions<I: IntoIterator<Item = S>, S: AsRef<str>>(
        mut self,
        exts: I,
    ) -> Self {
        self.definition.extension.rejected = collect(exts, normalize_extension);
        self
    }

    pub fn required_mime_full(mut self, mime: &str) -> Self {
        self.definition.mime_full.required = Some(lower(mime));
        self
    }

    pub fn allowed_mime_full<I: IntoIterator<Item = S>, S: AsRef<str>>(mut self, mimes: I) -> Self {
        self.definition.mime_full.allowed = collect(mimes, lower);
        self
    }

    pub fn rejected_mime_full<I: IntoIterator<Item = S>, S: AsRef<str>>(
        mut self,
        mimes: I,
    ) -> Self {
        self.definition.mime_full.rejected = collect(mimes, lower);
        self
    }

    pub fn required_mime_type(mut self, mime: &str) -> Self {
        self.definition.mime_type.required = Some(lower(mime));
        self
    }

    pub fn allowed_mime_types<I: IntoIterator<Item = S>, S: AsRef<str>>(
        mut self,
        mimes: I,
    ) -> Self {
        self.definition.mime_type.allowed = collect(mimes, lower);
        self
    }

    pub fn rejected_mime_types<I: IntoIterator<Item = S>, S: AsRef<str>>(
        mut self,
        mimes: I,
    ) -> Self {
        self.definition.mime_type.rejected = collect(mimes, lower);
        self
    }

    pub fn required_mime_encoding(mut self, encoding: &str) -> Self {
        self.definition.mime_encoding.required = Some(lower(encoding));
        self
    }

    pub fn allowed_mime_encodings<I: IntoIterator<Item = S>, S: AsRef<str>>(
        mut self,
        encodings: I,
    ) -> Self {
        self.definition.mime_encoding.allowed = collect(encodings, lower);
        self
    }

    pub fn rejected_mime_encodings<I: IntoIterator<Item = S>, S: AsRef<str>>(
        mut self,
        encodings: I,
    ) -> Self {
        self.definition.mime_encoding.rejected = collect(encodings, lower);
        self
    }

    pub fn allow_directory(mut self, allow: bool) -> Self {
        self.definition.allow_directory = allow;
        self
    }

    pub fn required_type(mut self, kind: FileKind) -> Self {
        self.definition.required_type = Some(kind);
        self
    }

    pub fn inherit_input_extension(mut self, inherit: bool) -> Self {
        self.definition.inherit_input_extension = inherit;
        self
    }

    /// Finishes the definition.
    ///
    /// A required extension turns off `allow_directory`. Requiring a directory
    /// together with a required extension, or while directories are disallowed,
    /// is an [`InvalidDefinition`](TranscodeError::InvalidDefinition).
    pub fn build(self) -> Result<FileHandlerDefinition, TranscodeError> {
        let mut definition = self.definition;
        definition.check()?;

        if definition.extension.required.is_some() {
            definition.allow_directory = false;
        }

        Ok(definition)
    }
}
