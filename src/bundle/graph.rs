// src/bundle/graph.rs

//! Module nodes and the dependency traversal from one entry.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::bundle::parse::{scan_requires, validate_json};
use crate::bundle::resolve::Resolver;
use crate::errors::{RebundleError, Result};
use crate::fs::{FileSystem, normalize_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Script,
    Json,
}

impl ModuleKind {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ModuleKind::Json,
            _ => ModuleKind::Script,
        }
    }
}

/// One resolved `require`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub specifier: String,
    pub resolved: PathBuf,
    /// Paths the resolver tried before `resolved`.
    pub probed: Vec<PathBuf>,
}

/// One source file of a closure.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub path: PathBuf,
    pub source: Arc<str>,
    /// blake3 of the source, hex.
    pub hash: String,
    pub kind: ModuleKind,
    /// Direct dependencies in order of first appearance.
    pub deps: Vec<Dependency>,
}

impl ModuleNode {
    pub fn same_deps(&self, other: &ModuleNode) -> bool {
        self.deps == other.deps
    }

    /// Whether a change at `path` can alter how this module's requires
    /// resolve. `gone` holds files that no longer exist.
    pub fn resolution_affected_by(&self, path: &Path, gone: bool) -> bool {
        self.deps
            .iter()
            .any(|d| (gone && d.resolved == path) || d.probed.iter().any(|p| p == path))
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Reads, scans and resolves single modules.
#[derive(Debug, Clone)]
pub struct ModuleLoader {
    fs: Arc<dyn FileSystem>,
    resolver: Resolver,
    /// Dynamic `require` is an error instead of a warning.
    strict_requires: bool,
}

impl ModuleLoader {
    pub fn new(fs: Arc<dyn FileSystem>, resolver: Resolver, strict_requires: bool) -> Self {
        Self {
            fs,
            resolver,
            strict_requires,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Source and hash of `path`. A file that cannot be read is reported as
    /// unresolvable from `parent`.
    pub fn read(&self, path: &Path, parent: Option<&Path>) -> Result<(Arc<str>, String)> {
        let text = self.fs.read_to_string(path).map_err(|err| {
            warn!(path = %path.display(), error = %err, "cannot read module");
            RebundleError::resolution(path.display().to_string(), parent)
        })?;
        let hash = content_hash(text.as_bytes());
        Ok((Arc::from(text), hash))
    }

    pub fn load(&self, path: &Path, parent: Option<&Path>) -> Result<ModuleNode> {
        let (source, hash) = self.read(path, parent)?;
        self.analyse(path, source, hash, parent)
    }

    /// Scan already-read source and resolve its dependencies.
    pub fn analyse(
        &self,
        path: &Path,
        source: Arc<str>,
        hash: String,
        parent: Option<&Path>,
    ) -> Result<ModuleNode> {
        let path = normalize_path(path);
        let kind = ModuleKind::of(&path);
        let parse_error = |line, column, message| RebundleError::Parse {
            path: path.clone(),
            line,
            column,
            message,
            parent: parent.map(Path::to_path_buf),
        };

        let mut deps = Vec::new();
        match kind {
            ModuleKind::Json => {
                validate_json(&source).map_err(|e| {
                    parse_error(e.position.line, e.position.column, e.message)
                })?;
            }
            ModuleKind::Script => {
                let scan = scan_requires(&source).map_err(|e| {
                    parse_error(e.position.line, e.position.column, e.message)
                })?;

                if let Some(pos) = scan.dynamic.first() {
                    if self.strict_requires {
                        return Err(parse_error(
                            pos.line,
                            pos.column,
                            "dynamic require() is not allowed in production".to_string(),
                        ));
                    }
                    for pos in &scan.dynamic {
                        warn!(
                            path = %path.display(),
                            line = pos.line,
                            column = pos.column,
                            "dynamic require() cannot be bundled; ignoring"
                        );
                    }
                }

                for specifier in scan.specifiers() {
                    let resolved = self.resolver.resolve_traced(specifier, &path)?;
                    deps.push(Dependency {
                        specifier: specifier.to_string(),
                        resolved: resolved.path,
                        probed: resolved.probed,
                    });
                }
            }
        }

        Ok(ModuleNode {
            path,
            source,
            hash,
            kind,
            deps,
        })
    }
}

/// A traversal that stopped early.
#[derive(Debug)]
pub struct TraversalError {
    pub error: RebundleError,
    /// Every file reached before the failure (the failing one included),
    /// plus the paths that would satisfy an unresolved relative `require`.
    pub watched: BTreeSet<PathBuf>,
}

/// Depth-first traversal from `entry` in source order.
///
/// Nodes already present in `nodes` are reused as-is; newly reached files
/// are loaded and inserted. Returns the post-order of first visitation (the
/// entry last). Nodes not in the returned order are left in `nodes` for the
/// caller to evict.
pub fn traverse(
    loader: &ModuleLoader,
    entry: &Path,
    nodes: &mut HashMap<PathBuf, ModuleNode>,
) -> std::result::Result<Vec<PathBuf>, TraversalError> {
    let entry = normalize_path(entry);
    let mut visited: BTreeSet<PathBuf> = BTreeSet::new();
    let mut order: Vec<PathBuf> = Vec::new();
    let mut stack: Vec<(PathBuf, usize)> = Vec::new();

    visited.insert(entry.clone());
    ensure_loaded(loader, &entry, None, nodes, &visited)?;
    stack.push((entry, 0));

    while let Some(frame) = stack.last_mut() {
        let next = nodes
            .get(&frame.0)
            .and_then(|node| node.deps.get(frame.1))
            .map(|dep| dep.resolved.clone());
        frame.1 += 1;
        let current = frame.0.clone();

        match next {
            Some(dep) => {
                // Marked before recursing so cycles terminate.
                if visited.insert(dep.clone()) {
                    ensure_loaded(loader, &dep, Some(&current), nodes, &visited)?;
                    stack.push((dep, 0));
                }
            }
            None => {
                stack.pop();
                order.push(current);
            }
        }
    }

    Ok(order)
}

fn ensure_loaded(
    loader: &ModuleLoader,
    path: &Path,
    parent: Option<&Path>,
    nodes: &mut HashMap<PathBuf, ModuleNode>,
    visited: &BTreeSet<PathBuf>,
) -> std::result::Result<(), TraversalError> {
    if nodes.contains_key(path) {
        return Ok(());
    }
    match loader.load(path, parent) {
        Ok(node) => {
            nodes.insert(path.to_path_buf(), node);
            Ok(())
        }
        Err(error) => {
            let mut watched = visited.clone();
            if let RebundleError::Resolution {
                specifier,
                parent: Some(from),
            } = &error
            {
                watched.extend(loader.resolver().candidates(specifier, from));
            }
            Err(TraversalError { error, watched })
        }
    }
}
