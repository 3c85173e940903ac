// src/bundle/mod.rs

//! Script bundling: dependency scanning, resolution, closure traversal,
//! packing and the per-entry incremental cache.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::anyhow;
use tracing::{debug, info};

use crate::errors::{RebundleError, Result};
use crate::output::{OutputWriter, WriteStatus};
use crate::watch::{Rebuild, RebuildOutcome};

pub mod cache;
pub mod graph;
pub mod pack;
pub mod parse;
pub mod resolve;

pub use cache::{BuildFailure, BuildKind, BuildOutput, BundleCache};
pub use graph::{ModuleLoader, ModuleNode};
pub use pack::{BundleArtifact, PackOptions, artifact_name};
pub use resolve::{ResolveOptions, Resolved, Resolver};

/// Write the map first so the `sourceMappingURL` in the code never points
/// at a missing file. Returns the paths actually rewritten.
pub fn write_artifact(writer: &OutputWriter, artifact: &BundleArtifact) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    if let Some(map) = &artifact.map {
        let (path, status) = writer.write(Path::new(&artifact.map_name()), map.as_bytes())?;
        if status == WriteStatus::Written {
            written.push(path);
        }
    }
    let (path, status) = writer.write(Path::new(&artifact.name), artifact.code.as_bytes())?;
    if status == WriteStatus::Written {
        written.push(path);
    }
    Ok(written)
}

/// One entry's cache plus the writer for its output directory.
///
/// Builds run on the blocking pool; the cache lock serializes them.
#[derive(Debug, Clone)]
pub struct EntryBundler {
    entry: PathBuf,
    /// Entry path relative to the project root, for logs.
    label: String,
    cache: Arc<Mutex<BundleCache>>,
    writer: Arc<OutputWriter>,
}

impl EntryBundler {
    pub fn new(label: String, cache: BundleCache, writer: Arc<OutputWriter>) -> Self {
        Self {
            entry: cache.entry().to_path_buf(),
            label,
            cache: Arc::new(Mutex::new(cache)),
            writer,
        }
    }

    pub fn entry(&self) -> &Path {
        &self.entry
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Build from scratch and write the artifact.
    pub async fn build(&self) -> RebuildOutcome {
        self.run(None).await
    }

    /// Incremental build after `changed` paths were touched.
    pub async fn update(&self, changed: Vec<PathBuf>) -> RebuildOutcome {
        self.run(Some(changed)).await
    }

    async fn run(&self, changed: Option<Vec<PathBuf>>) -> RebuildOutcome {
        let cache = Arc::clone(&self.cache);
        let writer = Arc::clone(&self.writer);
        let label = self.label.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            build_and_write(&mut cache, &writer, &label, changed)
        })
        .await;

        joined.unwrap_or_else(|err| RebuildOutcome {
            error: Some(RebundleError::Other(anyhow!(
                "bundle worker for {} stopped: {err}",
                self.label
            ))),
            ..RebuildOutcome::default()
        })
    }
}

fn build_and_write(
    cache: &mut BundleCache,
    writer: &OutputWriter,
    label: &str,
    changed: Option<Vec<PathBuf>>,
) -> RebuildOutcome {
    let started = Instant::now();
    if changed.is_none() || cache.needs_full() {
        info!(entry = %label, "bundling {}", label);
    }

    let result = match changed {
        None => cache.build_full(),
        Some(changed) => cache.rebuild(&changed),
    };

    match result {
        Ok(output) => {
            for path in &output.removed {
                debug!(entry = %label, path = %path.display(), "no longer part of the bundle");
            }
            let watched = Some(output.watched);
            if output.kind == BuildKind::Unchanged {
                debug!(entry = %label, "nothing to rebuild");
                return RebuildOutcome {
                    watched,
                    ..RebuildOutcome::default()
                };
            }
            match write_artifact(writer, &output.artifact) {
                Ok(written) => {
                    info!(entry = %label, kind = ?output.kind, "bundled {} in {:?}", label, started.elapsed());
                    RebuildOutcome {
                        watched,
                        written,
                        error: None,
                    }
                }
                Err(error) => RebuildOutcome {
                    watched,
                    written: Vec::new(),
                    error: Some(error),
                },
            }
        }
        Err(BuildFailure { error, watched }) => RebuildOutcome {
            watched: Some(watched),
            written: Vec::new(),
            error: Some(error),
        },
    }
}

impl Rebuild for EntryBundler {
    fn rebuild<'a>(
        &'a self,
        changed: Vec<PathBuf>,
    ) -> Pin<Box<dyn Future<Output = RebuildOutcome> + Send + 'a>> {
        Box::pin(self.update(changed))
    }
}

/// Two entries that would write the same output file.
pub fn check_unique_names<'a>(entries: impl IntoIterator<Item = (&'a Path, String)>) -> Result<()> {
    let mut seen: BTreeMap<String, &Path> = BTreeMap::new();
    for (entry, name) in entries {
        if let Some(first) = seen.get(&name) {
            return Err(RebundleError::resolution(
                format!(
                    "{} and {} both produce {}",
                    first.display(),
                    entry.display(),
                    name
                ),
                None,
            ));
        }
        seen.insert(name, entry);
    }
    Ok(())
}
