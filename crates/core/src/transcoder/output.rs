//! Output path claiming: conflict policy, directory creation and cleanup.

use std::io;
use std::path::{Path, PathBuf};

use super::types::{ConflictMode, DirectoryMode, FileMode};
use crate::error::TranscodeError;
use crate::events::{EventBus, TranscodeEvent};
use crate::file::naming::{final_segment, split_extension};

/// Claims output paths on the file system according to a request's policies.
pub(crate) struct OutputClaim<'a> {
    pub bus: &'a EventBus,
    pub conflict: ConflictMode,
    pub directory: DirectoryMode,
    pub directory_mode: FileMode,
}

impl OutputClaim<'_> {
    /// Resolves conflicts for `candidate`, prepares its parent directory and
    /// reserves the path by creating an empty file or directory there.
    ///
    /// Returns the path that was actually claimed.
    pub async fn claim(
        &self,
        candidate: PathBuf,
        is_directory: bool,
    ) -> Result<PathBuf, TranscodeError> {
        let mut path = self.resolve_conflict(&candidate, is_directory).await?;
        self.prepare_parent(&path).await?;

        let mut retried_delete = false;
        loop {
            match self.reserve(&path, is_directory).await {
                Ok(()) => break,
                // Someone else created the path since the conflict check
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => match self.conflict {
                    ConflictMode::Exception => {
                        return Err(TranscodeError::FileAlreadyExists { path });
                    }
                    ConflictMode::Increment => {
                        path = next_free_path(&candidate, is_directory).await?;
                    }
                    ConflictMode::Delete if !retried_delete => {
                        retried_delete = true;
                        remove_existing(self.bus, &path).await?;
                    }
                    ConflictMode::Delete => {
                        return Err(TranscodeError::FileAlreadyExists { path });
                    }
                },
                // Write access is only known once the create is attempted
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    let parent = path.parent().unwrap_or_else(|| Path::new("."));
                    return Err(TranscodeError::file_permission(
                        parent,
                        "directory is not writable",
                    ));
                }
                Err(e) => return Err(TranscodeError::file_permission(&path, e.to_string())),
            }
        }

        if is_directory {
            self.bus.publish(TranscodeEvent::DirCreated { path: path.clone() });
        }
        tracing::debug!(path = %path.display(), directory = is_directory, "Claimed output path");
        Ok(path)
    }

    async fn resolve_conflict(
        &self,
        candidate: &Path,
        is_directory: bool,
    ) -> Result<PathBuf, TranscodeError> {
        if !path_exists(candidate).await {
            return Ok(candidate.to_path_buf());
        }

        match self.conflict {
            ConflictMode::Exception => Err(TranscodeError::FileAlreadyExists {
                path: candidate.to_path_buf(),
            }),
            ConflictMode::Delete => {
                remove_existing(self.bus, candidate).await?;
                Ok(candidate.to_path_buf())
            }
            ConflictMode::Increment => next_free_path(candidate, is_directory).await,
        }
    }

    async fn prepare_parent(&self, path: &Path) -> Result<(), TranscodeError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        if !path_exists(&parent).await {
            match self.directory {
                DirectoryMode::Exception => {
                    return Err(TranscodeError::InvalidMode(format!(
                        "output directory {} does not exist and directory creation is disabled",
                        parent.display()
                    )));
                }
                DirectoryMode::Create => {
                    create_dir(&parent, self.directory_mode, true)
                        .await
                        .map_err(|e| TranscodeError::file_permission(&parent, e.to_string()))?;
                    tracing::info!(path = %parent.display(), "Created output directory");
                    self.bus.publish(TranscodeEvent::DirCreated { path: parent.clone() });
                }
            }
        }

        let metadata = tokio::fs::metadata(&parent)
            .await
            .map_err(|e| TranscodeError::file_permission(&parent, e.to_string()))?;
        if !metadata.is_dir() {
            return Err(TranscodeError::file_permission(&parent, "not a directory"));
        }
        Ok(())
    }

    async fn reserve(&self, path: &Path, is_directory: bool) -> io::Result<()> {
        if is_directory {
            create_dir(path, self.directory_mode, false).await
        } else {
            tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .await
                .map(|_| ())
        }
    }
}

/// Returns the first numbered variant of `path` that does not exist.
///
/// Files become `base.N.ext`; directories and extensionless files become `name_N`.
pub(crate) async fn next_free_path(
    path: &Path,
    is_directory: bool,
) -> Result<PathBuf, TranscodeError> {
    let name = final_segment(path);
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let split = if is_directory { None } else { split_extension(&name) };

    for n in 1u32.. {
        let numbered = match &split {
            Some((base, ext)) => format!("{base}.{n}.{ext}"),
            None => format!("{name}_{n}"),
        };
        let candidate = parent.join(numbered);
        if !path_exists(&candidate).await {
            return Ok(candidate);
        }
    }

    Err(TranscodeError::FileAlreadyExists {
        path: path.to_path_buf(),
    })
}

/// Removes a file or directory tree and publishes the matching removal event.
pub(crate) async fn remove_existing(bus: &EventBus, path: &Path) -> Result<(), TranscodeError> {
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .map_err(|e| TranscodeError::file_permission(path, e.to_string()))?;

    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| TranscodeError::file_permission(path, e.to_string()))?;
        bus.publish(TranscodeEvent::DirRemoved {
            path: path.to_path_buf(),
        });
    } else {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| TranscodeError::file_permission(path, e.to_string()))?;
        bus.publish(TranscodeEvent::FileRemoved {
            path: path.to_path_buf(),
        });
    }
    tracing::info!(path = %path.display(), "Removed existing output");
    Ok(())
}

/// Removes a reserved placeholder the adapter never wrote to.
///
/// Returns true if something was removed.
pub(crate) async fn remove_placeholder(path: &Path) -> bool {
    match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) if metadata.is_dir() => tokio::fs::remove_dir(path).await.is_ok(),
        Ok(metadata) if metadata.len() == 0 => tokio::fs::remove_file(path).await.is_ok(),
        _ => false,
    }
}

/// Applies permission bits to a finished output.
pub(crate) async fn apply_mode(path: &Path, mode: FileMode) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode.bits())).await
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(())
    }
}

pub(crate) async fn path_exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

async fn create_dir(path: &Path, mode: FileMode, recursive: bool) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(recursive);
    #[cfg(unix)]
    builder.mode(mode.bits());
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, TranscodeEvent};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn recorded(bus: &EventBus) -> Arc<Mutex<Vec<TranscodeEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        bus.subscribe_all(move |envelope| {
            sink.lock().unwrap().push(envelope.event.clone());
            Ok(())
        });
        events
    }

    fn claim(bus: &EventBus, conflict: ConflictMode, directory: DirectoryMode) -> OutputClaim<'_> {
        OutputClaim {
            bus,
            conflict,
            directory,
            directory_mode: FileMode::DEFAULT_DIRECTORY,
        }
    }

    #[tokio::test]
    async fn test_next_free_path_numbers_files_and_dirs() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("out.mp4");
        tokio::fs::write(&file, b"x").await.unwrap();
        tokio::fs::write(temp.path().join("out.1.mp4"), b"x").await.unwrap();

        assert_eq!(
            next_free_path(&file, false).await.unwrap(),
            temp.path().join("out.2.mp4")
        );
        assert_eq!(
            next_free_path(&temp.path().join("frames"), true).await.unwrap(),
            temp.path().join("frames_1")
        );
        assert_eq!(
            next_free_path(&temp.path().join("README"), false).await.unwrap(),
            temp.path().join("README_1")
        );
    }

    #[tokio::test]
    async fn test_claim_increment() {
        let temp = TempDir::new().unwrap();
        let bus = EventBus::new();
        let candidate = temp.path().join("a.txt");
        tokio::fs::write(&candidate, b"old").await.unwrap();

        let claimer = claim(&bus, ConflictMode::Increment, DirectoryMode::Exception);
        let first = claimer.claim(candidate.clone(), false).await.unwrap();
        let second = claimer.claim(candidate.clone(), false).await.unwrap();
        assert_eq!(first, temp.path().join("a.1.txt"));
        assert_eq!(second, temp.path().join("a.2.txt"));
        assert_eq!(tokio::fs::read(&candidate).await.unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_claim_exception_and_delete() {
        let temp = TempDir::new().unwrap();
        let bus = EventBus::new();
        let events = recorded(&bus);
        let candidate = temp.path().join("a.txt");
        tokio::fs::write(&candidate, b"old").await.unwrap();

        let result = claim(&bus, ConflictMode::Exception, DirectoryMode::Exception)
            .claim(candidate.clone(), false)
            .await;
        assert!(matches!(result, Err(TranscodeError::FileAlreadyExists { .. })));

        let path = claim(&bus, ConflictMode::Delete, DirectoryMode::Exception)
            .claim(candidate.clone(), false)
            .await
            .unwrap();
        assert_eq!(path, candidate);
        assert_eq!(tokio::fs::read(&candidate).await.unwrap().len(), 0);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::FileRemoved);
    }

    #[tokio::test]
    async fn test_delete_removes_directory_tree() {
        let temp = TempDir::new().unwrap();
        let bus = EventBus::new();
        let events = recorded(&bus);
        let candidate = temp.path().join("frames");
        tokio::fs::create_dir_all(candidate.join("nested")).await.unwrap();
        tokio::fs::write(candidate.join("nested/1.png"), b"x").await.unwrap();

        let path = claim(&bus, ConflictMode::Delete, DirectoryMode::Exception)
            .claim(candidate.clone(), true)
            .await
            .unwrap();
        assert_eq!(path, candidate);
        assert!(!path_exists(&candidate.join("nested")).await);

        let kinds: Vec<_> = events.lock().unwrap().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::DirRemoved, EventKind::DirCreated]);
    }

    #[tokio::test]
    async fn test_missing_parent_directory() {
        let temp = TempDir::new().unwrap();
        let bus = EventBus::new();
        let events = recorded(&bus);
        let candidate = temp.path().join("x/y/a.txt");

        let result = claim(&bus, ConflictMode::Increment, DirectoryMode::Exception)
            .claim(candidate.clone(), false)
            .await;
        assert!(matches!(result, Err(TranscodeError::InvalidMode(_))));
        assert!(!path_exists(&temp.path().join("x")).await);

        let path = claim(&bus, ConflictMode::Increment, DirectoryMode::Create)
            .claim(candidate.clone(), false)
            .await
            .unwrap();
        assert_eq!(path, candidate);
        let events = events.lock().unwrap();
        assert_eq!(
            events[0],
            TranscodeEvent::DirCreated {
                path: temp.path().join("x/y")
            }
        );
    }

    #[tokio::test]
    async fn test_remove_placeholder_keeps_written_files() {
        let temp = TempDir::new().unwrap();
        let empty = temp.path().join("empty.txt");
        let written = temp.path().join("written.txt");
        tokio::fs::write(&empty, b"").await.unwrap();
        tokio::fs::write(&written, b"data").await.unwrap();

        assert!(remove_placeholder(&empty).await);
        assert!(!remove_placeholder(&written).await);
        assert!(path_exists(&written).await);
        assert!(!remove_placeholder(&temp.path().join("missing")).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_claim_in_directory_without_owner_write() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("locked");
        tokio::fs::create_dir(&dir).await.unwrap();
        // Group and others may write, the owner may not
        tokio::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o577))
            .await
            .unwrap();
        if tokio::fs::write(dir.join("check"), b"").await.is_ok() {
            // Running with elevated privileges
            return;
        }

        let bus = EventBus::new();
        let result = claim(&bus, ConflictMode::Increment, DirectoryMode::Exception)
            .claim(dir.join("out.mp4"), false)
            .await;
        tokio::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755))
            .await
            .unwrap();

        match result {
            Err(TranscodeError::FilePermission { path, .. }) => assert_eq!(path, dir),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_apply_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        tokio::fs::write(&path, b"x").await.unwrap();
        apply_mode(&path, FileMode::from_bits(0o600).unwrap())
            .await
            .unwrap();
        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o600);
    }
}
