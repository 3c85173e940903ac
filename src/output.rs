// src/output.rs

//! Writes into one directory of the output tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::bundle::graph::content_hash;
use crate::errors::{RebundleError, Result};
use crate::fs::{FileSystem, normalize_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    /// Same bytes as the previous write; the file was left alone.
    Unchanged,
}

/// Atomic writer for `<output_dir>/<dest>`.
///
/// Remembers the hash of everything it wrote, so rewriting identical bytes
/// keeps the existing file (and its mtime).
#[derive(Debug)]
pub struct OutputWriter {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    last: Mutex<HashMap<PathBuf, String>>,
}

impl OutputWriter {
    pub fn new(fs: Arc<dyn FileSystem>, dir: &Path) -> Self {
        Self {
            fs,
            dir: normalize_path(dir),
            last: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to `rel` below the writer's directory.
    pub fn write(&self, rel: &Path, bytes: &[u8]) -> Result<(PathBuf, WriteStatus)> {
        let path = normalize_path(&self.dir.join(rel));
        let hash = content_hash(bytes);

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.get(&path) == Some(&hash) && self.fs.is_file(&path) {
            debug!(path = %path.display(), "output unchanged; not rewriting");
            return Ok((path, WriteStatus::Unchanged));
        }

        self.fs
            .write(&path, bytes)
            .map_err(|err| RebundleError::Write {
                path: path.clone(),
                message: format!("{err:#}"),
            })?;
        last.insert(path.clone(), hash);
        debug!(path = %path.display(), bytes = bytes.len(), "wrote output");
        Ok((path, WriteStatus::Written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::RealFileSystem;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn identical_bytes_are_written_once() {
        let fs = MockFileSystem::new();
        let writer = OutputWriter::new(Arc::new(fs.clone()), Path::new("build/js"));

        let (path, status) = writer.write(Path::new("main.js"), b"a").unwrap();
        assert_eq!(path, PathBuf::from("build/js/main.js"));
        assert_eq!(status, WriteStatus::Written);
        assert_eq!(writer.write(Path::new("main.js"), b"a").unwrap().1, WriteStatus::Unchanged);
        assert_eq!(writer.write(Path::new("main.js"), b"b").unwrap().1, WriteStatus::Written);
        assert_eq!(fs.write_count("build/js/main.js"), 2);
    }

    #[test]
    fn deleted_output_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(Arc::new(RealFileSystem), &dir.path().join("css"));

        let (path, _) = writer.write(Path::new("main.css"), b"body{}").unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(writer.write(Path::new("main.css"), b"body{}").unwrap().1, WriteStatus::Written);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "body{}");
    }

    #[test]
    fn write_failures_are_write_errors() {
        let fs = MockFileSystem::new();
        fs.deny_writes_under("build");
        let writer = OutputWriter::new(Arc::new(fs), Path::new("build/js"));

        let err = writer.write(Path::new("main.js"), b"x").unwrap_err();
        assert!(matches!(err, RebundleError::Write { .. }));
        assert!(err.is_fatal());
    }
}
