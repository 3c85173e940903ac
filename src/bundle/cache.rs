// src/bundle/cache.rs

//! Per-entry incremental build state.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::bundle::graph::{ModuleLoader, ModuleNode, traverse};
use crate::bundle::pack::{BundleArtifact, PackOptions, pack};
use crate::errors::RebundleError;
use crate::fs::normalize_path;

/// How a build was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    /// Every module read from scratch.
    Full,
    /// Contents changed, dependency lists did not: re-packed from cache.
    Repack,
    /// Dependency lists changed: closure recomputed, unchanged nodes reused.
    Retraverse,
    /// None of the changed paths affected the closure's content.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub artifact: BundleArtifact,
    /// Every file of the dependency closure.
    pub closure: BTreeSet<PathBuf>,
    /// The closure plus every path whose appearance would change how a
    /// `require` of the closure resolves.
    pub watched: BTreeSet<PathBuf>,
    /// Files that dropped out of the closure with this build.
    pub removed: Vec<PathBuf>,
    pub kind: BuildKind,
}

#[derive(Debug)]
pub struct BuildFailure {
    pub error: RebundleError,
    /// Files to keep watching so that a fix triggers the next build.
    pub watched: BTreeSet<PathBuf>,
}

pub type BuildResult = std::result::Result<BuildOutput, BuildFailure>;

/// Memoized builder state for one entry.
///
/// Nodes are keyed by normalized path and owned by this cache alone; two
/// entries sharing a file each hold their own node for it.
#[derive(Debug)]
pub struct BundleCache {
    entry: PathBuf,
    name: String,
    loader: ModuleLoader,
    pack: PackOptions,
    nodes: HashMap<PathBuf, ModuleNode>,
    /// Module order of the last successful build, entry last.
    order: Vec<PathBuf>,
    last: Option<BundleArtifact>,
    needs_full: bool,
}

impl BundleCache {
    pub fn new(entry: &Path, name: String, loader: ModuleLoader, pack: PackOptions) -> Self {
        Self {
            entry: normalize_path(entry),
            name,
            loader,
            pack,
            nodes: HashMap::new(),
            order: Vec::new(),
            last: None,
            needs_full: true,
        }
    }

    pub fn entry(&self) -> &Path {
        &self.entry
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn closure(&self) -> BTreeSet<PathBuf> {
        self.order.iter().cloned().collect()
    }

    /// Paths to watch for this entry: the closure and the resolver probes
    /// that lost to a closure file.
    pub fn watched(&self) -> BTreeSet<PathBuf> {
        let mut watched = self.closure();
        for node in self.order.iter().filter_map(|p| self.nodes.get(p)) {
            for dep in &node.deps {
                watched.extend(dep.probed.iter().cloned());
            }
        }
        watched
    }

    /// Whether the next build will start from scratch.
    pub fn needs_full(&self) -> bool {
        self.needs_full
    }

    /// Throw away all state and build from scratch.
    pub fn build_full(&mut self) -> BuildResult {
        debug!(entry = %self.entry.display(), "full build");
        let previous = self.closure();
        let previous_watched = self.watched();
        self.nodes.clear();
        self.retraverse(previous, previous_watched, BuildKind::Full)
    }

    /// Bring the bundle up to date after `changed` paths were modified,
    /// created or deleted.
    pub fn rebuild(&mut self, changed: &[PathBuf]) -> BuildResult {
        if self.needs_full || self.last.is_none() {
            return self.build_full();
        }

        let previous = self.closure();
        let previous_watched = self.watched();
        let changed: BTreeSet<PathBuf> = changed.iter().map(|p| normalize_path(p)).collect();
        let mut structural = false;
        let mut content_changed = false;
        let mut gone: BTreeSet<PathBuf> = BTreeSet::new();
        let mut analysed: BTreeSet<PathBuf> = BTreeSet::new();

        for path in &changed {
            let Some(old_hash) = self.nodes.get(path).map(|n| n.hash.clone()) else {
                continue;
            };
            let parent = self.parent_of(path);

            let (source, hash) = match self.loader.read(path, parent.as_deref()) {
                Ok(read) => read,
                Err(_) => {
                    // Deleted: whoever required it resolves again below.
                    debug!(path = %path.display(), "changed file unreadable; re-resolving its parents");
                    self.nodes.remove(path);
                    gone.insert(path.clone());
                    structural = true;
                    continue;
                }
            };
            if hash == old_hash {
                debug!(path = %path.display(), "content unchanged; skipping");
                continue;
            }

            let node = match self.loader.analyse(path, source, hash, parent.as_deref()) {
                Ok(node) => node,
                Err(error) => return Err(self.fail(error, previous_watched, path)),
            };

            content_changed = true;
            analysed.insert(path.clone());
            if self.nodes.get(path).is_none_or(|old| !old.same_deps(&node)) {
                structural = true;
            }
            self.nodes.insert(path.clone(), node);
        }

        // Modules whose requires may now land on a different file: a
        // resolved target vanished, or a file appeared where the resolver
        // looked first.
        let stale: Vec<PathBuf> = self
            .order
            .iter()
            .filter(|p| !analysed.contains(*p) && !gone.contains(*p))
            .filter(|p| {
                self.nodes.get(*p).is_some_and(|node| {
                    changed
                        .iter()
                        .any(|c| node.resolution_affected_by(c, gone.contains(c)))
                })
            })
            .cloned()
            .collect();

        for path in stale {
            let Some((source, hash)) = self
                .nodes
                .get(&path)
                .map(|n| (Arc::clone(&n.source), n.hash.clone()))
            else {
                continue;
            };
            let parent = self.parent_of(&path);
            let node = match self.loader.analyse(&path, source, hash, parent.as_deref()) {
                Ok(node) => node,
                Err(error) => return Err(self.fail(error, previous_watched, &path)),
            };
            if self.nodes.get(&path).is_none_or(|old| !old.same_deps(&node)) {
                debug!(path = %path.display(), "requires resolve differently now");
                structural = true;
            }
            self.nodes.insert(path, node);
        }

        if structural {
            self.retraverse(previous, previous_watched, BuildKind::Retraverse)
        } else if content_changed {
            self.repack(Vec::new(), BuildKind::Repack)
        } else {
            match &self.last {
                Some(artifact) => Ok(BuildOutput {
                    artifact: artifact.clone(),
                    closure: previous,
                    watched: previous_watched,
                    removed: Vec::new(),
                    kind: BuildKind::Unchanged,
                }),
                None => self.build_full(),
            }
        }
    }

    /// Record a failed module and keep watching everything that was watched
    /// before, plus whatever would fix an unresolved `require`.
    fn fail(&mut self, error: RebundleError, mut watched: BTreeSet<PathBuf>, path: &Path) -> BuildFailure {
        self.needs_full = true;
        watched.insert(path.to_path_buf());
        if let RebundleError::Resolution {
            specifier,
            parent: Some(from),
        } = &error
        {
            watched.extend(self.loader.resolver().candidates(specifier, from));
        }
        BuildFailure { error, watched }
    }

    fn retraverse(
        &mut self,
        previous: BTreeSet<PathBuf>,
        previous_watched: BTreeSet<PathBuf>,
        kind: BuildKind,
    ) -> BuildResult {
        match traverse(&self.loader, &self.entry, &mut self.nodes) {
            Ok(order) => {
                let reachable: BTreeSet<&PathBuf> = order.iter().collect();
                self.nodes.retain(|path, _| reachable.contains(path));
                let removed = previous
                    .iter()
                    .filter(|p| !reachable.contains(p))
                    .cloned()
                    .collect();
                self.order = order;
                self.repack(removed, kind)
            }
            Err(failure) => {
                self.needs_full = true;
                let mut watched = failure.watched;
                watched.extend(previous_watched);
                Err(BuildFailure {
                    error: failure.error,
                    watched,
                })
            }
        }
    }

    fn repack(&mut self, removed: Vec<PathBuf>, kind: BuildKind) -> BuildResult {
        let closure = self.closure();
        let watched = self.watched();

        let modules: Vec<&ModuleNode> = self
            .order
            .iter()
            .filter_map(|path| self.nodes.get(path))
            .collect();

        match pack(&self.name, &modules, &self.pack) {
            Ok(artifact) => {
                self.needs_full = false;
                self.last = Some(artifact.clone());
                Ok(BuildOutput {
                    artifact,
                    closure,
                    watched,
                    removed,
                    kind,
                })
            }
            Err(error) => {
                self.needs_full = true;
                Err(BuildFailure { error, watched })
            }
        }
    }

    /// First module of the closure that requires `path`.
    fn parent_of(&self, path: &Path) -> Option<PathBuf> {
        self.order
            .iter()
            .filter_map(|p| self.nodes.get(p))
            .find(|node| node.deps.iter().any(|d| d.resolved == path))
            .map(|node| node.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::resolve::{ResolveOptions, Resolver};
    use crate::fs::FileSystem;
    use crate::fs::mock::MockFileSystem;
    use std::sync::Arc;

    fn cache(fs: &MockFileSystem, entry: &str) -> BundleCache {
        let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
        let loader = ModuleLoader::new(
            Arc::clone(&shared),
            Resolver::new(shared, ResolveOptions::default()),
            false,
        );
        BundleCache::new(
            Path::new(entry),
            "main.js".to_string(),
            loader,
            PackOptions {
                debug: true,
                root: PathBuf::from("."),
            },
        )
    }

    fn set(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn content_only_change_repacks() {
        let fs = MockFileSystem::new();
        fs.add_file("main.js", "require('./lib');");
        fs.add_file("lib.js", "old();");
        let mut c = cache(&fs, "main.js");
        c.build_full().unwrap();

        fs.add_file("lib.js", "fresh();");
        let out = c.rebuild(&[PathBuf::from("lib.js")]).unwrap();
        assert_eq!(out.kind, BuildKind::Repack);
        assert!(out.artifact.code.contains("fresh();"));
    }

    #[test]
    fn identical_content_is_skipped() {
        let fs = MockFileSystem::new();
        fs.add_file("main.js", "require('./lib');");
        fs.add_file("lib.js", "same();");
        let mut c = cache(&fs, "main.js");
        let first = c.build_full().unwrap();

        let out = c.rebuild(&[PathBuf::from("lib.js")]).unwrap();
        assert_eq!(out.kind, BuildKind::Unchanged);
        assert_eq!(out.artifact, first.artifact);
    }

    #[test]
    fn paths_outside_the_closure_are_ignored() {
        let fs = MockFileSystem::new();
        fs.add_file("main.js", "");
        fs.add_file("other.js", "");
        let mut c = cache(&fs, "main.js");
        c.build_full().unwrap();
        let out = c.rebuild(&[PathBuf::from("other.js")]).unwrap();
        assert_eq!(out.kind, BuildKind::Unchanged);
    }

    #[test]
    fn dropped_dependency_is_removed() {
        let fs = MockFileSystem::new();
        fs.add_file("main.js", "require('./a'); require('./b');");
        fs.add_file("a.js", "");
        fs.add_file("b.js", "require('./c');");
        fs.add_file("c.js", "");
        let mut c = cache(&fs, "main.js");
        assert_eq!(c.build_full().unwrap().closure, set(&["main.js", "a.js", "b.js", "c.js"]));

        fs.add_file("main.js", "require('./a');");
        let out = c.rebuild(&[PathBuf::from("main.js")]).unwrap();
        assert_eq!(out.kind, BuildKind::Retraverse);
        assert_eq!(out.closure, set(&["main.js", "a.js"]));
        assert_eq!(out.removed, vec![PathBuf::from("b.js"), PathBuf::from("c.js")]);
    }

    #[test]
    fn failure_forces_a_full_build_next_time() {
        let fs = MockFileSystem::new();
        fs.add_file("main.js", "require('./lib');");
        fs.add_file("lib.js", "");
        let mut c = cache(&fs, "main.js");
        c.build_full().unwrap();

        fs.add_file("lib.js", "/* unterminated");
        let failure = c.rebuild(&[PathBuf::from("lib.js")]).unwrap_err();
        assert!(matches!(failure.error, RebundleError::Parse { .. }));
        assert!(failure.watched.contains(Path::new("lib.js")));
        assert!(c.needs_full());

        fs.add_file("lib.js", "fixed();");
        let out = c.rebuild(&[PathBuf::from("lib.js")]).unwrap();
        assert_eq!(out.kind, BuildKind::Full);
        assert!(!c.needs_full());
    }

    #[test]
    fn deleted_dependency_fails_with_its_parent() {
        let fs = MockFileSystem::new();
        fs.add_file("main.js", "require('./lib');");
        fs.add_file("lib.js", "");
        let mut c = cache(&fs, "main.js");
        c.build_full().unwrap();

        fs.remove_file("lib.js");
        let failure = c.rebuild(&[PathBuf::from("lib.js")]).unwrap_err();
        let msg = failure.error.to_string();
        assert!(msg.contains("'./lib'"), "{msg}");
        assert!(msg.contains("required by main.js"), "{msg}");
        // Recreating the file must trigger a rebuild.
        assert!(failure.watched.contains(Path::new("lib.js")));
        assert!(failure.watched.contains(Path::new("lib/index.js")));
    }

    #[test]
    fn deleted_dependency_falls_back_to_the_next_candidate() {
        let fs = MockFileSystem::new();
        fs.add_file("main.js", "require('./lib');");
        fs.add_file("lib.js", "file();");
        fs.add_file("lib/index.js", "dir();");
        let mut c = cache(&fs, "main.js");
        assert_eq!(c.build_full().unwrap().closure, set(&["main.js", "lib.js"]));

        fs.remove_file("lib.js");
        let out = c.rebuild(&[PathBuf::from("lib.js")]).unwrap();
        assert_eq!(out.kind, BuildKind::Retraverse);
        assert_eq!(out.closure, set(&["main.js", "lib/index.js"]));
        assert_eq!(out.removed, vec![PathBuf::from("lib.js")]);
        assert!(out.artifact.code.contains("dir();"));
        assert!(out.watched.contains(Path::new("lib.js")));
    }

    #[test]
    fn new_file_taking_over_a_resolution_is_picked_up() {
        let fs = MockFileSystem::new();
        fs.add_file("main.js", "require('./lib');");
        fs.add_file("lib/index.js", "dir();");
        let mut c = cache(&fs, "main.js");
        let first = c.build_full().unwrap();
        assert_eq!(first.closure, set(&["main.js", "lib/index.js"]));
        assert!(first.watched.contains(Path::new("lib.js")));

        fs.add_file("lib.js", "file();");
        let out = c.rebuild(&[PathBuf::from("lib.js")]).unwrap();
        assert_eq!(out.kind, BuildKind::Retraverse);
        assert_eq!(out.closure, set(&["main.js", "lib.js"]));
        assert!(out.artifact.code.contains("file();"));
        assert!(!out.artifact.code.contains("dir();"));
    }

    #[test]
    fn probe_only_change_that_resolves_the_same_is_unchanged() {
        let fs = MockFileSystem::new();
        fs.add_file("main.js", "require('./lib');");
        fs.add_file("lib.js", "");
        let mut c = cache(&fs, "main.js");
        c.build_full().unwrap();

        // `lib` is probed before `lib.js`; touching it as a directory does
        // not move the resolution.
        fs.add_file("lib/other.js", "");
        let out = c.rebuild(&[PathBuf::from("lib")]).unwrap();
        assert_eq!(out.kind, BuildKind::Unchanged);
        assert_eq!(out.closure, set(&["main.js", "lib.js"]));
    }
}
