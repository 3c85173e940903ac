// src/watch/patterns.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};

use crate::fs::{FileSystem, normalize_path, rel_string};

/// One compiled pattern from an ordered include/exclude list.
#[derive(Clone)]
struct Rule {
    source: String,
    matcher: GlobMatcher,
    negated: bool,
    /// Literal leading directories of the pattern, relative to the root.
    base: PathBuf,
}

/// Ordered glob list where `!`-prefixed patterns exclude.
///
/// The last pattern matching a path decides whether it is a member. `*`
/// never crosses a directory separator; `**` does. A leading `./` is
/// ignored. Paths are matched relative to the project root with forward
/// slashes.
#[derive(Clone, Default)]
pub struct PatternSet {
    rules: Vec<Rule>,
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| r.source.as_str()))
            .finish()
    }
}

/// A file selected by a pattern set, with the base directory of the pattern
/// that selected it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    pub path: PathBuf,
    pub base: PathBuf,
}

impl MatchedFile {
    /// Path below the pattern's base, e.g. `shims/a/b.js` for
    /// `node_modules/webshim/**/*` selecting `.../shims/a/b.js`.
    pub fn relative_to_base(&self) -> &Path {
        self.path.strip_prefix(&self.base).unwrap_or(&self.path)
    }
}

/// Directories skipped while expanding globs.
#[derive(Debug, Clone, Default)]
pub struct WalkFilter {
    /// Directory names pruned anywhere below a pattern's base.
    pub names: Vec<String>,
    /// Exact directories pruned (e.g. the output directory).
    pub paths: Vec<PathBuf>,
}

impl WalkFilter {
    pub fn new(names: Vec<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            names,
            paths: paths.iter().map(|p| normalize_path(p)).collect(),
        }
    }

    fn prunes(&self, dir: &Path) -> bool {
        let by_name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.names.iter().any(|ignored| ignored == n));
        by_name || self.paths.iter().any(|p| p == dir)
    }
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut rules = Vec::with_capacity(patterns.len());

        for raw in patterns {
            let raw = raw.as_ref();
            let (negated, pat) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            let pat = strip_dot_slash(pat);
            if pat.is_empty() {
                anyhow::bail!("empty glob pattern: {raw:?}");
            }

            let glob = GlobBuilder::new(pat)
                .literal_separator(true)
                .build()
                .with_context(|| format!("invalid glob pattern: {raw}"))?;

            rules.push(Rule {
                source: raw.to_string(),
                matcher: glob.compile_matcher(),
                negated,
                base: glob_base(pat),
            });
        }

        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns true if the path (relative to the root, forward slashes) is a
    /// member of this set.
    pub fn is_match(&self, rel_path: &str) -> bool {
        self.deciding_rule(strip_dot_slash(rel_path))
            .is_some_and(|rule| !rule.negated)
    }

    fn deciding_rule(&self, rel_path: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matcher.is_match(rel_path))
    }

    /// Distinct base directories of the include patterns.
    pub fn bases(&self) -> Vec<PathBuf> {
        let mut bases: Vec<PathBuf> = Vec::new();
        for rule in self.rules.iter().filter(|r| !r.negated) {
            if !bases.contains(&rule.base) {
                bases.push(rule.base.clone());
            }
        }
        bases
    }

    /// Collect every existing file under `root` that belongs to this set,
    /// sorted and deduplicated.
    ///
    /// The walk starts at each include pattern's base; directories below a
    /// base are pruned according to `filter`.
    pub fn collect(
        &self,
        fs: &dyn FileSystem,
        root: &Path,
        filter: &WalkFilter,
    ) -> Result<Vec<MatchedFile>> {
        let root = normalize_path(root);
        let mut found: BTreeMap<PathBuf, MatchedFile> = BTreeMap::new();

        for base in self.bases() {
            let start = normalize_path(&root.join(&base));
            let mut stack = vec![start];

            while let Some(path) = stack.pop() {
                if fs.is_dir(&path) {
                    for child in fs.read_dir(&path)? {
                        if fs.is_dir(&child) && filter.prunes(&normalize_path(&child)) {
                            continue;
                        }
                        stack.push(child);
                    }
                } else if fs.is_file(&path) {
                    let path = normalize_path(&path);
                    if found.contains_key(&path) {
                        continue;
                    }
                    let rel = rel_string(&root, &path);
                    if let Some(rule) = self.deciding_rule(&rel) {
                        if !rule.negated {
                            let base = normalize_path(&root.join(&rule.base));
                            found.insert(path.clone(), MatchedFile { path, base });
                        }
                    }
                }
            }
        }

        Ok(found.into_values().collect())
    }
}

fn strip_dot_slash(mut s: &str) -> &str {
    while let Some(rest) = s.strip_prefix("./") {
        s = rest;
    }
    s
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '[', ']', '{', '}'])
}

/// Literal leading directory of a pattern.
///
/// `static/js/*.js` -> `static/js`, `**/static/js/*.js` -> ``, and a pattern
/// without wildcards yields its parent directory.
fn glob_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let components: Vec<Component<'_>> = path.components().collect();

    let mut base = PathBuf::new();
    for (i, component) in components.iter().enumerate() {
        let text = component.as_os_str().to_string_lossy();
        if has_glob_meta(&text) {
            return base;
        }
        // The last literal component names a file.
        if i + 1 == components.len() {
            return base;
        }
        base.push(component.as_os_str());
    }
    base
}
