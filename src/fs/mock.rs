// src/fs/mock.rs

use super::{FileSystem, normalize_path};
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Number of `write` calls per path, for asserting skipped writes.
    writes: HashMap<PathBuf, usize>,
    /// When set, writes below this directory fail.
    read_only: Option<PathBuf>,
}

/// In-memory file system. Clones share state.
///
/// All keys are lexically normalized, so `./static/js/a.js` and
/// `static/js/a.js` address the same entry.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut state = MockState::default();
        // Ensure root exists
        state
            .entries
            .insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalize_path(path.as_ref());
        let mut state = self.lock();
        state.entries.insert(path.clone(), MockEntry::File(content.into()));
        link_into_parent(&mut state.entries, &path);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = normalize_path(path.as_ref());
        let mut state = self.lock();
        ensure_dir_entry(&mut state.entries, &path);
    }

    /// Delete a file (no-op when it does not exist).
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let path = normalize_path(path.as_ref());
        let mut state = self.lock();
        if matches!(state.entries.get(&path), Some(MockEntry::File(_))) {
            state.entries.remove(&path);
            unlink_from_parent(&mut state.entries, &path);
        }
    }

    /// Make every write below `dir` fail, simulating a read-only output tree.
    pub fn deny_writes_under(&self, dir: impl AsRef<Path>) {
        self.lock().read_only = Some(normalize_path(dir.as_ref()));
    }

    /// Current file contents as UTF-8, if the file exists.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let path = normalize_path(path.as_ref());
        match self.lock().entries.get(&path) {
            Some(MockEntry::File(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    /// How many times `write` targeted `path`.
    pub fn write_count(&self, path: impl AsRef<Path>) -> usize {
        let path = normalize_path(path.as_ref());
        self.lock().writes.get(&path).copied().unwrap_or(0)
    }
}

fn parent_key(path: &Path) -> Option<PathBuf> {
    match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Some(PathBuf::from(".")),
        Some(p) => Some(p.to_path_buf()),
        None => None,
    }
}

fn child_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(str::to_string)
}

fn link_into_parent(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    let Some(parent) = parent_key(path) else {
        return;
    };
    if parent == path {
        return;
    }
    ensure_dir_entry(entries, &parent);
    if let (Some(MockEntry::Dir(children)), Some(name)) = (entries.get_mut(&parent), child_name(path)) {
        if !children.contains(&name) {
            children.push(name);
        }
    }
}

fn unlink_from_parent(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if let (Some(parent), Some(name)) = (parent_key(path), child_name(path)) {
        if let Some(MockEntry::Dir(children)) = entries.get_mut(&parent) {
            children.retain(|c| c != &name);
        }
    }
}

fn ensure_dir_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if entries.contains_key(path) {
        return;
    }
    entries.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
    link_into_parent(entries, path);
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8 in {:?}: {}", path, e))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let key = normalize_path(path);
        let state = self.lock();
        match state.entries.get(&key) {
            Some(MockEntry::File(content)) => Ok(content.clone()),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let key = normalize_path(path);
        {
            let mut state = self.lock();
            if let Some(ro) = &state.read_only {
                if key.starts_with(ro) {
                    return Err(anyhow!("Permission denied: {:?}", path));
                }
            }
            *state.writes.entry(key.clone()).or_insert(0) += 1;
        }
        self.add_file(&key, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(&normalize_path(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(
            self.lock().entries.get(&normalize_path(path)),
            Some(MockEntry::File(_))
        )
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(
            self.lock().entries.get(&normalize_path(path)),
            Some(MockEntry::Dir(_))
        )
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let key = normalize_path(path);
        if self.lock().entries.contains_key(&key) {
            Ok(key)
        } else {
            Err(anyhow!("File not found: {:?}", path))
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let key = normalize_path(path);
        let state = self.lock();
        match state.entries.get(&key) {
            Some(MockEntry::Dir(children)) => Ok(children
                .iter()
                .map(|name| normalize_path(&key.join(name)))
                .collect()),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let key = normalize_path(path);
        let mut state = self.lock();
        let doomed: Vec<PathBuf> = state
            .entries
            .keys()
            .filter(|p| p.starts_with(&key))
            .cloned()
            .collect();
        for p in doomed {
            state.entries.remove(&p);
        }
        unlink_from_parent(&mut state.entries, &key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_normalized() {
        let fs = MockFileSystem::new();
        fs.add_file("./static/js/a.js", "a");

        assert!(fs.is_file(Path::new("static/js/lib/../a.js")));
        assert!(fs.is_dir(Path::new("static")));
        assert_eq!(
            fs.read_dir(Path::new(".")).unwrap(),
            vec![PathBuf::from("static")]
        );
    }

    #[test]
    fn remove_dir_all_drops_subtree() {
        let fs = MockFileSystem::new();
        fs.add_file("build/js/a.js", "a");
        fs.add_file("build/css/a.css", "a");
        fs.add_file("static/js/a.js", "a");

        fs.remove_dir_all(Path::new("build")).unwrap();

        assert!(!fs.exists(Path::new("build/js/a.js")));
        assert!(!fs.exists(Path::new("build")));
        assert!(fs.exists(Path::new("static/js/a.js")));
        assert_eq!(fs.read_dir(Path::new(".")).unwrap(), vec![PathBuf::from("static")]);
    }

    #[test]
    fn denied_writes_fail() {
        let fs = MockFileSystem::new();
        fs.deny_writes_under("build");
        assert!(fs.write(Path::new("build/js/a.js"), b"x").is_err());
        assert!(fs.write(Path::new("other/a.js"), b"x").is_ok());
        assert_eq!(fs.write_count("other/a.js"), 1);
    }
}
