// src/tasks/copy.rs

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::OnceLock;

use anyhow::Context;
use tracing::{info, warn};

use crate::errors::Result;
use crate::output::{OutputWriter, WriteStatus};
use crate::tasks::{TaskAction, TaskContext};
use crate::types::TaskId;
use crate::watch::PatternSet;

/// Copies vendor files into `<output_dir>/<dest>`, keeping each file's path
/// relative to the base of the pattern that selected it.
#[derive(Debug)]
pub struct CopyAction {
    id: TaskId,
    files: PatternSet,
    dest: String,
    writer: OnceLock<OutputWriter>,
}

impl CopyAction {
    pub fn new(id: TaskId, files: PatternSet, dest: String) -> Self {
        Self {
            id,
            files,
            dest,
            writer: OnceLock::new(),
        }
    }
}

impl TaskAction for CopyAction {
    fn run<'a>(
        &'a self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
        Box::pin(async move {
            let writer = self
                .writer
                .get_or_init(|| OutputWriter::new(ctx.fs.clone(), &ctx.dest_dir(&self.dest)));

            let matched = ctx.collect(&self.files)?;
            if matched.is_empty() {
                warn!(task = %self.id, patterns = ?self.files, "no files matched");
                return Ok(Vec::new());
            }

            let mut written = Vec::new();
            for file in &matched {
                let bytes = ctx
                    .fs
                    .read(&file.path)
                    .with_context(|| format!("copying {}", ctx.rel(&file.path)))?;
                let (path, status) = writer.write(file.relative_to_base(), &bytes)?;
                if status == WriteStatus::Written {
                    written.push(path);
                }
            }

            info!(
                task = %self.id,
                files = matched.len(),
                changed = written.len(),
                dest = %writer.dir().display(),
                "copied files"
            );
            Ok(written)
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
    use std::sync::Arc;

    #[tokio::test]
    async fn keeps_paths_below_the_glob_base() {
        let fs = MockFileSystem::new();
        fs.add_file("node_modules/webshim/shims/a.js", "a");
        fs.add_file("node_modules/webshim/shims/sub/b.js", "b");
        let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
        let ctx = TaskContext::new(Path::new("."), &loader::builtin().unwrap(), RunMode::Once, shared);

        let action = CopyAction::new(
            TaskId::new("webshim-files"),
            PatternSet::new(&["./node_modules/webshim/shims/**/*"]).unwrap(),
            "vendor/shims".to_string(),
        );
        let written = action.run(&ctx).await.unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(fs.contents("build/vendor/shims/a.js").as_deref(), Some("a"));
        assert_eq!(fs.contents("build/vendor/shims/sub/b.js").as_deref(), Some("b"));

        // A second run with identical sources rewrites nothing.
        assert!(action.run(&ctx).await.unwrap().is_empty());
    }
}
