// src/tasks/bundle.rs

use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::bundle::{
    BundleCache, EntryBundler, ModuleLoader, PackOptions, Resolver, artifact_name,
    check_unique_names,
};
use crate::errors::{RebundleError, Result};
use crate::output::OutputWriter;
use crate::tasks::{TaskAction, TaskContext};
use crate::types::TaskId;
use crate::watch::{PatternSet, Rebuild, RebuildOutcome, WatchTarget};

/// Bundles every script entry into `<output_dir>/<dest>/<entry>.js`.
///
/// Entries are resolved once per run; each gets its own cache. In watch mode
/// every cache is handed to the watch subscriber afterwards.
#[derive(Debug)]
pub struct BundleAction {
    id: TaskId,
    entries: PatternSet,
    dest: String,
    debug: bool,
}

impl BundleAction {
    pub fn new(id: TaskId, entries: PatternSet, dest: String, debug: bool) -> Self {
        Self {
            id,
            entries,
            dest,
            debug,
        }
    }

    fn bundlers(&self, ctx: &TaskContext) -> Result<Vec<Arc<EntryBundler>>> {
        let entries = ctx.collect(&self.entries)?;
        check_unique_names(
            entries
                .iter()
                .map(|e| (e.path.as_path(), artifact_name(&e.path))),
        )?;

        let writer = Arc::new(OutputWriter::new(ctx.fs.clone(), &ctx.dest_dir(&self.dest)));
        let loader = ModuleLoader::new(
            ctx.fs.clone(),
            Resolver::new(ctx.fs.clone(), ctx.resolve.clone()),
            ctx.production,
        );
        let pack = PackOptions {
            debug: self.debug,
            root: ctx.root.clone(),
        };

        Ok(entries
            .iter()
            .map(|entry| {
                let cache = BundleCache::new(
                    &entry.path,
                    artifact_name(&entry.path),
                    loader.clone(),
                    pack.clone(),
                );
                Arc::new(EntryBundler::new(ctx.rel(&entry.path), cache, Arc::clone(&writer)))
            })
            .collect())
    }
}

impl TaskAction for BundleAction {
    fn run<'a>(
        &'a self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
        Box::pin(async move {
            let bundlers = self.bundlers(ctx)?;
            if bundlers.is_empty() {
                warn!(task = %self.id, patterns = ?self.entries, "no script entries matched");
            }

            // Entries are independent; build them concurrently.
            let mut set = JoinSet::new();
            for (index, bundler) in bundlers.iter().enumerate() {
                let bundler = Arc::clone(bundler);
                set.spawn(async move { (index, bundler.build().await) });
            }
            let mut outcomes: Vec<Option<RebuildOutcome>> = bundlers.iter().map(|_| None).collect();
            while let Some(joined) = set.join_next().await {
                let (index, outcome) = joined.map_err(|e| {
                    RebundleError::Other(anyhow::anyhow!("bundle build stopped: {e}"))
                })?;
                outcomes[index] = Some(outcome);
            }

            let mut written = Vec::new();
            let mut failures: Vec<RebundleError> = Vec::new();

            for (bundler, outcome) in bundlers.iter().zip(outcomes) {
                let outcome = outcome.unwrap_or_default();
                let watched = outcome.watched.unwrap_or_default();

                if let Some(watch) = &ctx.watch {
                    info!(task = %self.id, entry = %bundler.label(), "watching files required by {}", bundler.label());
                    watch.subscribe(
                        WatchTarget::Entry(bundler.entry().to_path_buf()),
                        watched,
                        Arc::clone(bundler) as Arc<dyn Rebuild>,
                    );
                }

                written.extend(outcome.written);
                if let Some(err) = outcome.error {
                    error!(task = %self.id, entry = %bundler.label(), error = %err, "bundle failed");
                    failures.push(err);
                }
            }

            if let Some(watch) = &ctx.watch {
                let known: BTreeSet<PathBuf> =
                    bundlers.iter().map(|b| b.entry().to_path_buf()).collect();
                watch.watch_entry_roots(self.id.clone(), self.entries.clone(), known);
            }

            // A write error outranks everything else: it stops the process.
            if let Some(pos) = failures.iter().position(RebundleError::is_fatal) {
                let failed = failures.len();
                let first = failures.swap_remove(pos);
                return Err(RebundleError::EntriesFailed {
                    failed,
                    total: bundlers.len(),
                    first: Box::new(first),
                });
            }
            let failed = failures.len();
            match failures.into_iter().next() {
                None => Ok(written),
                Some(first) => Err(RebundleError::EntriesFailed {
                    failed,
                    total: bundlers.len(),
                    first: Box::new(first),
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader;
    use crate::fs::FileSystem;
    use crate::fs::mock::MockFileSystem;
    use crate::types::RunMode;
    use std::path::Path;

    fn action() -> BundleAction {
        BundleAction::new(
            TaskId::new("browserify"),
            PatternSet::new(&["./static/js/*.js", "./**/static/js/*.js"]).unwrap(),
            "js".to_string(),
            true,
        )
    }

    fn ctx(fs: &MockFileSystem) -> TaskContext {
        let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
        TaskContext::new(Path::new("."), &loader::builtin().unwrap(), RunMode::Once, shared)
    }

    #[tokio::test]
    async fn one_broken_entry_does_not_block_the_others() {
        let fs = MockFileSystem::new();
        fs.add_file("static/js/a.js", "require('./missing');");
        fs.add_file("static/js/b.js", "ok();");

        let err = action().run(&ctx(&fs)).await.unwrap_err();
        match &err {
            RebundleError::EntriesFailed { failed, total, first } => {
                assert_eq!((*failed, *total), (1, 2));
                assert!(first.to_string().contains("./missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_fatal());
        assert!(fs.contents("build/js/b.js").is_some());
        assert!(fs.contents("build/js/a.js").is_none());
    }

    #[tokio::test]
    async fn clashing_output_names_fail_the_task() {
        let fs = MockFileSystem::new();
        fs.add_file("static/js/main.js", "");
        fs.add_file("studies/static/js/main.js", "");
        let err = action().run(&ctx(&fs)).await.unwrap_err();
        assert!(matches!(err, RebundleError::Resolution { .. }));
    }

    #[tokio::test]
    async fn write_failure_is_fatal() {
        let fs = MockFileSystem::new();
        fs.add_file("static/js/a.js", "ok();");
        fs.deny_writes_under("build");
        let err = action().run(&ctx(&fs)).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
