//! Path segment helpers shared by descriptors, definitions and presets.

use std::path::{Component, Path, PathBuf};

/// Returns the final segment of a path as text.
///
/// `.` and `..` segments are returned literally; a root or prefix yields an empty string.
pub(crate) fn final_segment(path: &Path) -> String {
    match path.components().next_back() {
        Some(Component::Normal(name)) => name.to_string_lossy().into_owned(),
        Some(Component::CurDir) => ".".to_string(),
        Some(Component::ParentDir) => "..".to_string(),
        _ => String::new(),
    }
}

/// Splits a file name into `(base, extension)` at its last dot.
///
/// Returns `None` when the name has no dot or is one of the bare `.`/`..` segments.
pub(crate) fn split_extension(name: &str) -> Option<(&str, &str)> {
    if name == "." || name == ".." {
        return None;
    }
    name.rsplit_once('.')
}

/// Returns the name with its own extension stripped.
pub(crate) fn strip_extension(name: &str) -> &str {
    split_extension(name).map(|(base, _)| base).unwrap_or(name)
}

/// Lower-cases an extension and strips surrounding dots.
pub(crate) fn normalize_extension(ext: &str) -> String {
    ext.trim_matches('.').to_lowercase()
}

/// Returns the lower-cased extension of the path's final segment, or an empty string.
pub(crate) fn extension_of(path: &Path) -> String {
    split_extension(&final_segment(path))
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Removes trailing separators from a caller supplied path.
pub(crate) fn trim_trailing_separators(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches(std::path::is_separator);
    if trimmed.len() == text.len() {
        path.to_path_buf()
    } else if trimmed.is_empty() {
        // The path was only separators, i.e. the root.
        path.components().collect()
    } else {
        PathBuf::from(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_segment() {
        assert_eq!(final_segment(Path::new("/a/b/c.mp4")), "c.mp4");
        assert_eq!(final_segment(Path::new("/a/b/")), "b");
        assert_eq!(final_segment(Path::new("/foo/..")), "..");
        assert_eq!(final_segment(Path::new("/")), "");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.tar.gz"), Some(("a.tar", "gz")));
        assert_eq!(split_extension("noext"), None);
        assert_eq!(split_extension(".."), None);
        assert_eq!(split_extension("."), None);
        assert_eq!(split_extension(".hidden"), Some(("", "hidden")));
    }

    #[test]
    fn test_extension_of_is_lower_cased() {
        assert_eq!(extension_of(Path::new("/x/Movie.MOV")), "mov");
        assert_eq!(extension_of(Path::new("/x/README")), "");
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".MP3"), "mp3");
        assert_eq!(normalize_extension("ogg"), "ogg");
    }

    #[test]
    fn test_trim_trailing_separators() {
        assert_eq!(
            trim_trailing_separators(Path::new("/foo/bar/")),
            PathBuf::from("/foo/bar")
        );
        assert_eq!(
            trim_trailing_separators(Path::new("/foo/../")),
            PathBuf::from("/foo/..")
        );
        assert_eq!(
            trim_trailing_separators(Path::new("rel/dir")),
            PathBuf::from("rel/dir")
        );
        assert_eq!(trim_trailing_separators(Path::new("/")), PathBuf::from("/"));
    }
}
