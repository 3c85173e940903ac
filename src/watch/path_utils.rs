// src/watch/path_utils.rs

//! Mapping raw watcher event paths onto project paths.

use std::path::{Path, PathBuf};

use crate::fs::normalize_path;

/// Convert an event path into a string relative to `root`, with forward
/// slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again. A deleted file cannot be
///   canonicalized, so its parent is canonicalized instead.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    })?;

    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

/// The project path (`root` joined with the relative part) for an event
/// path, or `None` when the event lies outside the project.
pub fn project_path(root: &Path, path: &Path) -> Option<PathBuf> {
    let rel = relative_str(root, path)?;
    Some(normalize_path(&root.join(rel)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_root_prefix() {
        let root = Path::new("/project");
        assert_eq!(
            relative_str(root, Path::new("/project/static/js/a.js")).as_deref(),
            Some("static/js/a.js")
        );
        assert_eq!(
            project_path(root, Path::new("/project/static/js/a.js")),
            Some(PathBuf::from("/project/static/js/a.js"))
        );
    }

    #[test]
    fn unrelated_path_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(relative_str(dir.path(), Path::new("/definitely/not/here.js")), None);
    }

    #[test]
    fn symlinked_root_is_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().canonicalize().unwrap();
        std::fs::write(real.join("a.js"), "").unwrap();
        // Same directory spelled through its canonical path.
        assert_eq!(
            relative_str(&real, &real.join("a.js")).as_deref(),
            Some("a.js")
        );
    }
}
