// src/bundle/resolve.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::ResolveSection;
use crate::errors::{RebundleError, Result};
use crate::fs::{FileSystem, normalize_path};

/// Module resolution settings.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Probed in order after the bare path, e.g. `.js`, `.json`.
    pub extensions: Vec<String>,
    /// Directory names searched in every ancestor, e.g. `node_modules`.
    pub module_dirs: Vec<String>,
    /// Extra search roots for logical names.
    pub paths: Vec<PathBuf>,
}

impl ResolveOptions {
    /// Options from the `[resolve]` section; extra roots are taken relative
    /// to `root`.
    pub fn from_section(section: &ResolveSection, root: &Path) -> Self {
        Self {
            extensions: section.extensions.clone(),
            module_dirs: section.module_dirs.clone(),
            paths: section
                .paths
                .iter()
                .map(|p| normalize_path(&root.join(p)))
                .collect(),
        }
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from_section(&ResolveSection::default(), Path::new("."))
    }
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: PathBuf,
    /// Paths checked before `path` won, in probe order. A file appearing at
    /// one of them (or a `package.json` among them changing) can change the
    /// result.
    pub probed: Vec<PathBuf>,
}

/// Maps `require` specifiers to files.
#[derive(Debug, Clone)]
pub struct Resolver {
    fs: Arc<dyn FileSystem>,
    opts: ResolveOptions,
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

fn dir_of(file: &Path) -> &Path {
    file.parent().unwrap_or(Path::new(""))
}

impl Resolver {
    pub fn new(fs: Arc<dyn FileSystem>, opts: ResolveOptions) -> Self {
        Self { fs, opts }
    }

    /// Resolve `specifier` as required from the file `from`.
    ///
    /// The result is lexically normalized.
    pub fn resolve(&self, specifier: &str, from: &Path) -> Result<PathBuf> {
        self.resolve_traced(specifier, from).map(|r| r.path)
    }

    /// Like [`resolve`](Self::resolve), also reporting every path that was
    /// looked at before the winner.
    pub fn resolve_traced(&self, specifier: &str, from: &Path) -> Result<Resolved> {
        let mut probed = Vec::new();
        match self.lookup(specifier, from, &mut probed) {
            Some(path) => {
                debug!(specifier, from = %from.display(), resolved = %path.display(), "resolved");
                Ok(Resolved { path, probed })
            }
            None => Err(RebundleError::resolution(specifier, Some(from))),
        }
    }

    /// Files whose appearance could make an unresolved specifier resolve:
    /// everything a lookup checks. Empty if `specifier` does resolve.
    pub fn candidates(&self, specifier: &str, from: &Path) -> Vec<PathBuf> {
        let mut trail = Vec::new();
        match self.lookup(specifier, from, &mut trail) {
            Some(_) => Vec::new(),
            None => trail,
        }
    }

    fn lookup(&self, specifier: &str, from: &Path, trail: &mut Vec<PathBuf>) -> Option<PathBuf> {
        if is_path_specifier(specifier) {
            self.probe(&dir_of(from).join(specifier), trail)
        } else {
            self.resolve_logical(specifier, from, trail)
        }
    }

    fn resolve_logical(
        &self,
        specifier: &str,
        from: &Path,
        trail: &mut Vec<PathBuf>,
    ) -> Option<PathBuf> {
        for ancestor in dir_of(from).ancestors() {
            // `node_modules/node_modules` is never a search location.
            let is_module_dir = ancestor
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| self.opts.module_dirs.iter().any(|m| m == n));
            if is_module_dir {
                continue;
            }
            for dir in &self.opts.module_dirs {
                if let Some(found) = self.probe(&ancestor.join(dir).join(specifier), trail) {
                    return Some(found);
                }
            }
        }

        self.opts
            .paths
            .iter()
            .find_map(|root| self.probe(&root.join(specifier), trail))
    }

    /// File, then file + extension, then directory. Misses are appended to
    /// `trail`.
    fn probe(&self, path: &Path, trail: &mut Vec<PathBuf>) -> Option<PathBuf> {
        let path = normalize_path(path);
        self.probe_file(&path, trail)
            .or_else(|| self.probe_dir(&path, trail))
    }

    fn probe_file(&self, path: &Path, trail: &mut Vec<PathBuf>) -> Option<PathBuf> {
        let candidates = std::iter::once(path.to_path_buf())
            .chain(self.opts.extensions.iter().map(|ext| with_suffix(path, ext)));
        for candidate in candidates {
            if self.fs.is_file(&candidate) {
                return Some(candidate);
            }
            trail.push(candidate);
        }
        None
    }

    // A directory that does not exist yet is probed all the same: its
    // manifest and index land in `trail`.
    fn probe_dir(&self, dir: &Path, trail: &mut Vec<PathBuf>) -> Option<PathBuf> {
        if let Some(main) = self.package_main(dir, trail) {
            let target = normalize_path(&dir.join(main));
            let found = self
                .probe_file(&target, trail)
                .or_else(|| self.probe_index(&target, trail));
            if found.is_some() {
                return found;
            }
        }
        self.probe_index(dir, trail)
    }

    fn probe_index(&self, dir: &Path, trail: &mut Vec<PathBuf>) -> Option<PathBuf> {
        self.probe_file(&dir.join("index"), trail)
    }

    /// `main` of `dir/package.json`. The manifest always goes to `trail`:
    /// its content decides the result even when it exists.
    fn package_main(&self, dir: &Path, trail: &mut Vec<PathBuf>) -> Option<String> {
        let manifest = dir.join("package.json");
        trail.push(manifest.clone());
        if !self.fs.is_file(&manifest) {
            return None;
        }
        let text = self.fs.read_to_string(&manifest).ok()?;
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => value
                .get("main")
                .and_then(|m| m.as_str())
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            Err(err) => {
                debug!(path = %manifest.display(), error = %err, "ignoring unreadable package.json");
                None
            }
        }
    }
}

/// `foo.min` + `.js` -> `foo.min.js` (not `foo.js`).
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn resolver(fs: &MockFileSystem) -> Resolver {
        Resolver::new(Arc::new(fs.clone()), ResolveOptions::default())
    }

    #[test]
    fn relative_file_then_extension() {
        let fs = MockFileSystem::new();
        fs.add_file("static/js/a.js", "");
        fs.add_file("static/js/lib/util.js", "");
        fs.add_file("static/js/data.json", "{}");
        let r = resolver(&fs);
        let from = Path::new("static/js/a.js");

        assert_eq!(r.resolve("./lib/util", from).unwrap(), PathBuf::from("static/js/lib/util.js"));
        assert_eq!(r.resolve("./lib/util.js", from).unwrap(), PathBuf::from("static/js/lib/util.js"));
        assert_eq!(r.resolve("./data", from).unwrap(), PathBuf::from("static/js/data.json"));
        assert_eq!(
            r.resolve("../js/./lib/../a", Path::new("static/js/lib/util.js")).unwrap(),
            PathBuf::from("static/js/a.js")
        );
    }

    #[test]
    fn directory_uses_package_main_then_index() {
        let fs = MockFileSystem::new();
        fs.add_file("static/js/a.js", "");
        fs.add_file("static/js/widget/package.json", r#"{"main": "lib/widget"}"#);
        fs.add_file("static/js/widget/lib/widget.js", "");
        fs.add_file("static/js/plain/index.js", "");
        let r = resolver(&fs);
        let from = Path::new("static/js/a.js");

        assert_eq!(r.resolve("./widget", from).unwrap(), PathBuf::from("static/js/widget/lib/widget.js"));
        assert_eq!(r.resolve("./plain", from).unwrap(), PathBuf::from("static/js/plain/index.js"));
    }

    #[test]
    fn logical_names_search_nearest_module_dir_first() {
        let fs = MockFileSystem::new();
        fs.add_file("node_modules/jquery/package.json", r#"{"main": "dist/jquery.js"}"#);
        fs.add_file("node_modules/jquery/dist/jquery.js", "");
        fs.add_file("app/node_modules/jquery/index.js", "");
        fs.add_file("app/static/js/a.js", "");
        fs.add_file("static/js/b.js", "");
        let r = resolver(&fs);

        assert_eq!(
            r.resolve("jquery", Path::new("app/static/js/a.js")).unwrap(),
            PathBuf::from("app/node_modules/jquery/index.js")
        );
        assert_eq!(
            r.resolve("jquery", Path::new("static/js/b.js")).unwrap(),
            PathBuf::from("node_modules/jquery/dist/jquery.js")
        );
    }

    #[test]
    fn extra_paths_come_last() {
        let fs = MockFileSystem::new();
        fs.add_file("static/js/a.js", "");
        fs.add_file("vendor/js/shared.js", "");
        let opts = ResolveOptions {
            paths: vec![PathBuf::from("vendor/js")],
            ..ResolveOptions::default()
        };
        let r = Resolver::new(Arc::new(fs.clone()), opts);
        assert_eq!(
            r.resolve("shared", Path::new("static/js/a.js")).unwrap(),
            PathBuf::from("vendor/js/shared.js")
        );
    }

    #[test]
    fn traced_resolution_lists_shadowing_paths() {
        let fs = MockFileSystem::new();
        fs.add_file("main.js", "");
        fs.add_file("lib/index.js", "");
        let r = resolver(&fs);

        let traced = r.resolve_traced("./lib", Path::new("main.js")).unwrap();
        assert_eq!(traced.path, PathBuf::from("lib/index.js"));
        assert_eq!(
            traced.probed,
            vec![
                PathBuf::from("lib"),
                PathBuf::from("lib.js"),
                PathBuf::from("lib.json"),
                PathBuf::from("lib/package.json"),
                PathBuf::from("lib/index"),
            ]
        );

        // Once `lib.js` exists it wins and nothing before it is left.
        fs.add_file("lib.js", "");
        let traced = r.resolve_traced("./lib", Path::new("main.js")).unwrap();
        assert_eq!(traced.path, PathBuf::from("lib.js"));
        assert_eq!(traced.probed, vec![PathBuf::from("lib")]);
    }

    #[test]
    fn failure_names_specifier_and_parent() {
        let fs = MockFileSystem::new();
        fs.add_file("static/js/a.js", "");
        let r = resolver(&fs);
        let err = r.resolve("./missing", Path::new("static/js/a.js")).unwrap_err();
        match err {
            RebundleError::Resolution { specifier, parent } => {
                assert_eq!(specifier, "./missing");
                assert_eq!(parent, Some(PathBuf::from("static/js/a.js")));
            }
            other => panic!("unexpected error: {other}"),
        }
        let candidates = r.candidates("./missing", Path::new("static/js/a.js"));
        assert_eq!(
            candidates[..3],
            [
                PathBuf::from("static/js/missing"),
                PathBuf::from("static/js/missing.js"),
                PathBuf::from("static/js/missing.json"),
            ]
        );
        assert!(candidates.contains(&PathBuf::from("static/js/missing/index.js")));
        assert!(
            r.candidates("jquery", Path::new("static/js/a.js"))
                .contains(&PathBuf::from("node_modules/jquery/index.js"))
        );
        assert!(r.candidates("./a", Path::new("static/js/a.js")).is_empty());
    }
}
