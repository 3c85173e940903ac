// src/watch/subscriptions.rs

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::types::TaskId;
use crate::watch::patterns::PatternSet;

/// Something that rebuilds when a watched path changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WatchTarget {
    /// A bundle entry; watches its dependency closure.
    Entry(PathBuf),
    /// A task re-run by a pattern-based watch.
    Task(TaskId),
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchTarget::Entry(path) => write!(f, "{}", path.display()),
            WatchTarget::Task(id) => write!(f, "task '{id}'"),
        }
    }
}

/// Paths added and removed by a subscription replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDelta {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl SubscriptionDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Explicit path -> targets table.
///
/// Exact-path subscriptions come from dependency closures and are replaced
/// wholesale after every rebuild; pattern subscriptions come from watch
/// tasks and never change.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    by_path: HashMap<PathBuf, BTreeSet<WatchTarget>>,
    by_target: HashMap<WatchTarget, BTreeSet<PathBuf>>,
    patterns: Vec<(PatternSet, WatchTarget)>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `paths` the exact set watched for `target`.
    pub fn replace(&mut self, target: &WatchTarget, paths: BTreeSet<PathBuf>) -> SubscriptionDelta {
        let old = self.by_target.remove(target).unwrap_or_default();

        let removed: Vec<PathBuf> = old.difference(&paths).cloned().collect();
        let added: Vec<PathBuf> = paths.difference(&old).cloned().collect();

        for path in &removed {
            if let Some(targets) = self.by_path.get_mut(path) {
                targets.remove(target);
                if targets.is_empty() {
                    self.by_path.remove(path);
                }
            }
        }
        for path in &added {
            self.by_path
                .entry(path.clone())
                .or_default()
                .insert(target.clone());
        }

        if !paths.is_empty() {
            self.by_target.insert(target.clone(), paths);
        }

        SubscriptionDelta { added, removed }
    }

    pub fn add_patterns(&mut self, target: WatchTarget, patterns: PatternSet) {
        self.patterns.push((patterns, target));
    }

    /// Targets affected by a change to `path` (`rel` is the same path
    /// relative to the project root, used for pattern subscriptions).
    pub fn targets_for(&self, path: &Path, rel: &str) -> BTreeSet<WatchTarget> {
        let mut targets = self.by_path.get(path).cloned().unwrap_or_default();
        for (patterns, target) in &self.patterns {
            if patterns.is_match(rel) {
                targets.insert(target.clone());
            }
        }
        targets
    }

    pub fn watched_paths(&self, target: &WatchTarget) -> BTreeSet<PathBuf> {
        self.by_target.get(target).cloned().unwrap_or_default()
    }

    /// Whether any exact subscription covers `path`.
    pub fn is_watched(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn replace_grows_and_shrinks() {
        let mut table = SubscriptionTable::new();
        let a = WatchTarget::Entry(PathBuf::from("a.js"));
        let b = WatchTarget::Entry(PathBuf::from("b.js"));

        table.replace(&a, set(&["a.js", "shared.js", "old.js"]));
        table.replace(&b, set(&["b.js", "shared.js"]));

        let delta = table.replace(&a, set(&["a.js", "shared.js", "new.js"]));
        assert_eq!(delta.added, vec![PathBuf::from("new.js")]);
        assert_eq!(delta.removed, vec![PathBuf::from("old.js")]);

        assert!(table.targets_for(Path::new("old.js"), "old.js").is_empty());
        assert!(!table.is_watched(Path::new("old.js")));
        let shared = table.targets_for(Path::new("shared.js"), "shared.js");
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn patterns_match_relative_paths() {
        let mut table = SubscriptionTable::new();
        let target = WatchTarget::Task(TaskId::new("postcss"));
        table.add_patterns(target.clone(), PatternSet::new(&["static/css/**/*.css"]).unwrap());

        let hits = table.targets_for(Path::new("/p/static/css/_vars.css"), "static/css/_vars.css");
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![target]);
        assert!(table.targets_for(Path::new("/p/x.js"), "x.js").is_empty());
    }
}
