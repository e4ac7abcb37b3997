//! Inspected filesystem entries.

use mime::Mime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use super::naming::{extension_of, final_segment};
use super::sniff::{self, BINARY_CHARSET, SNIFF_LEN};
use crate::error::TranscodeError;

/// Whether a filesystem entry is a regular file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Directory,
}

impl FileKind {
    /// Returns the lower-case name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inspected file or directory.
///
/// Descriptors are immutable snapshots: the path is resolved and the MIME type
/// detected once, at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    path: PathBuf,
    kind: FileKind,
    extension: String,
    mime: Mime,
}

impl FileDescriptor {
    /// Inspects the entry at `path`.
    ///
    /// Resolves the path to an absolute one, determines the entry kind and
    /// detects the MIME type from the first bytes of file content.
    pub async fn inspect(path: impl AsRef<Path>) -> Result<Self, TranscodeError> {
        let path = path.as_ref();
        let resolved = tokio::fs::canonicalize(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TranscodeError::invalid_file(path, "file does not exist")
            } else {
                TranscodeError::Io(e)
            }
        })?;

        let metadata = tokio::fs::metadata(&resolved).await?;
        let (kind, mime) = if metadata.is_dir() {
            (FileKind::Directory, sniff::directory_mime())
        } else {
            let head = read_head(&resolved).await?;
            (FileKind::File, sniff::detect(&head))
        };

        Ok(Self::from_parts(resolved, kind, mime))
    }

    /// Builds a descriptor from already known attributes without touching the filesystem.
    pub fn from_parts(path: impl Into<PathBuf>, kind: FileKind, mime: Mime) -> Self {
        let path = path.into();
        let extension = extension_of(&path);
        Self {
            path,
            kind,
            extension,
            mime,
        }
    }

    /// Returns the resolved path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the entry kind.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Returns the final path segment.
    pub fn file_name(&self) -> String {
        final_segment(&self.path)
    }

    /// Returns the lower-cased extension of the final path segment, empty if there is none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Returns the full detected MIME value, including its charset parameter.
    pub fn mime(&self) -> &Mime {
        &self.mime
    }

    /// Returns the MIME type without parameters, e.g. `text/plain`.
    pub fn mime_type(&self) -> &str {
        self.mime.essence_str()
    }

    /// Returns the MIME subtype, e.g. `plain`.
    pub fn mime_subtype(&self) -> &str {
        self.mime.subtype().as_str()
    }

    /// Returns the MIME charset, e.g. `us-ascii` or `binary`.
    pub fn mime_encoding(&self) -> &str {
        self.mime
            .get_param(mime::CHARSET)
            .map(|charset| charset.as_str())
            .unwrap_or(BINARY_CHARSET)
    }

    /// Lists the entries contained in this directory, sorted by path.
    pub async fn contained_files(&self) -> Result<Vec<FileDescriptor>, TranscodeError> {
        if !self.is_dir() {
            return Err(TranscodeError::invalid_file(
                &self.path,
                "only directories contain files",
            ));
        }

        let mut entries = tokio::fs::read_dir(&self.path).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            files.push(Self::inspect(entry.path()).await?);
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(files)
    }
}

async fn read_head(path: &Path) -> Result<Vec<u8>, TranscodeError> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(head)
}
