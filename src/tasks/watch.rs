// src/tasks/watch.rs

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

use crate::errors::Result;
use crate::tasks::{TaskAction, TaskContext};
use crate::types::TaskId;
use crate::watch::{PatternSet, Rebuild, RebuildOutcome, WatchTarget};

/// Re-runs another task whenever a file matching `patterns` changes.
///
/// Continuous: completes once the subscription is in place. Outside watch
/// mode there is nothing to subscribe to and it completes immediately.
pub struct WatchAction {
    id: TaskId,
    patterns: PatternSet,
    rerun: TaskId,
    action: Arc<dyn TaskAction>,
}

impl std::fmt::Debug for WatchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchAction")
            .field("id", &self.id)
            .field("patterns", &self.patterns)
            .field("rerun", &self.rerun)
            .finish_non_exhaustive()
    }
}

impl WatchAction {
    pub fn new(id: TaskId, patterns: PatternSet, rerun: TaskId, action: Arc<dyn TaskAction>) -> Self {
        Self {
            id,
            patterns,
            rerun,
            action,
        }
    }
}

/// A task action bound to the context it re-runs in.
struct TaskRerun {
    action: Arc<dyn TaskAction>,
    ctx: TaskContext,
}

impl Rebuild for TaskRerun {
    fn rebuild<'a>(
        &'a self,
        _changed: Vec<PathBuf>,
    ) -> Pin<Box<dyn Future<Output = RebuildOutcome> + Send + 'a>> {
        Box::pin(async move {
            match self.action.run(&self.ctx).await {
                Ok(written) => RebuildOutcome {
                    watched: None,
                    written,
                    error: None,
                },
                Err(err) => RebuildOutcome {
                    error: Some(err),
                    ..RebuildOutcome::default()
                },
            }
        })
    }
}

impl TaskAction for WatchAction {
    fn run<'a>(
        &'a self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
        Box::pin(async move {
            let Some(watch) = &ctx.watch else {
                info!(task = %self.id, "not watching; nothing to do");
                return Ok(Vec::new());
            };

            watch.subscribe_patterns(
                WatchTarget::Task(self.rerun.clone()),
                self.patterns.clone(),
                Arc::new(TaskRerun {
                    action: Arc::clone(&self.action),
                    ctx: ctx.clone(),
                }),
            );
            info!(task = %self.id, rerun = %self.rerun, patterns = ?self.patterns, "watching");
            Ok(Vec::new())
        })
    }
}
