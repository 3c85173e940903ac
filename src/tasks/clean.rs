// src/tasks/clean.rs

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tracing::info;

use crate::errors::{RebundleError, Result};
use crate::tasks::{TaskAction, TaskContext};
use crate::types::TaskId;

/// Removes the output directory.
#[derive(Debug)]
pub struct CleanAction {
    id: TaskId,
}

impl CleanAction {
    pub fn new(id: TaskId) -> Self {
        Self { id }
    }
}

impl TaskAction for CleanAction {
    fn run<'a>(
        &'a self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
        Box::pin(async move {
            if ctx.output_dir == ctx.root || ctx.root.starts_with(&ctx.output_dir) {
                return Err(RebundleError::ConfigError(format!(
                    "refusing to remove {}: it contains the project",
                    ctx.output_dir.display()
                )));
            }
            ctx.fs.remove_dir_all(&ctx.output_dir)?;
            info!(task = %self.id, dir = %ctx.output_dir.display(), "removed output directory");
            Ok(Vec::new())
        })
    }
}
