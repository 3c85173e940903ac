// src/tasks/styles.rs

//! Style sheet compilation.
//!
//! The transform chain itself is external: either the source is copied
//! through unchanged, or a shell command does the work.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use tracing::{error, info, warn};

use crate::errors::{RebundleError, Result};
use crate::exec::command::{run_shell, run_shell_capture, shell_quote};
use crate::output::{OutputWriter, WriteStatus};
use crate::tasks::{TaskAction, TaskContext};
use crate::types::TaskId;
use crate::watch::{MatchedFile, PatternSet};

/// What a compiler produced for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compiled {
    /// CSS text for the writer.
    Css(String),
    /// The compiler wrote the output file itself.
    WrittenTo(PathBuf),
}

pub trait StyleCompiler: Send + Sync {
    fn compile<'a>(
        &'a self,
        input: &'a Path,
        output: &'a Path,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Compiled>> + Send + 'a>>;
}

/// Copies the source unchanged.
#[derive(Debug, Default)]
pub struct Passthrough;

impl StyleCompiler for Passthrough {
    fn compile<'a>(
        &'a self,
        input: &'a Path,
        _output: &'a Path,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Compiled>> + Send + 'a>> {
        Box::pin(async move { Ok(Compiled::Css(ctx.fs.read_to_string(input)?)) })
    }
}

/// Runs a command per entry. `{input}` is replaced with the entry path;
/// with `{output}` the command writes the file itself, otherwise its stdout
/// is the compiled CSS.
#[derive(Debug)]
pub struct CommandCompiler {
    cmd: String,
}

impl CommandCompiler {
    pub fn new(cmd: String) -> Self {
        Self { cmd }
    }

    fn render(&self, input: &str, output: &str) -> String {
        self.cmd
            .replace("{input}", &shell_quote(input))
            .replace("{output}", &shell_quote(output))
    }
}

impl StyleCompiler for CommandCompiler {
    fn compile<'a>(
        &'a self,
        input: &'a Path,
        output: &'a Path,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Compiled>> + Send + 'a>> {
        Box::pin(async move {
            let cmd = self.render(&ctx.rel(input), &ctx.rel(output));
            if self.cmd.contains("{output}") {
                if let Some(parent) = output.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                run_shell("styles", &cmd, &ctx.root).await?;
                Ok(Compiled::WrittenTo(output.to_path_buf()))
            } else {
                Ok(Compiled::Css(run_shell_capture(&cmd, &ctx.root).await?))
            }
        })
    }
}

/// Compiles every style entry into `<output_dir>/<dest>/<name>.css`.
pub struct StylesAction {
    id: TaskId,
    entries: PatternSet,
    dest: String,
    compiler: Arc<dyn StyleCompiler>,
    writer: OnceLock<OutputWriter>,
}

impl std::fmt::Debug for StylesAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StylesAction")
            .field("id", &self.id)
            .field("entries", &self.entries)
            .field("dest", &self.dest)
            .finish_non_exhaustive()
    }
}

impl StylesAction {
    pub fn new(
        id: TaskId,
        entries: PatternSet,
        dest: String,
        compiler: Arc<dyn StyleCompiler>,
    ) -> Self {
        Self {
            id,
            entries,
            dest,
            compiler,
            writer: OnceLock::new(),
        }
    }

    async fn compile_one(
        &self,
        writer: &OutputWriter,
        entry: &MatchedFile,
        ctx: &TaskContext,
    ) -> Result<Option<PathBuf>> {
        let rel_out = entry.relative_to_base().with_extension("css");
        let out_path = writer.dir().join(&rel_out);

        let compiled = self
            .compiler
            .compile(&entry.path, &out_path, ctx)
            .await
            .with_context(|| format!("compiling {}", ctx.rel(&entry.path)))?;

        match compiled {
            Compiled::Css(css) => {
                let (path, status) = writer.write(&rel_out, css.as_bytes())?;
                Ok((status == WriteStatus::Written).then_some(path))
            }
            Compiled::WrittenTo(path) => Ok(Some(path)),
        }
    }
}

impl TaskAction for StylesAction {
    fn run<'a>(
        &'a self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
        Box::pin(async move {
            let writer = self
                .writer
                .get_or_init(|| OutputWriter::new(ctx.fs.clone(), &ctx.dest_dir(&self.dest)));

            let entries = ctx.collect(&self.entries)?;
            if entries.is_empty() {
                warn!(task = %self.id, patterns = ?self.entries, "no style entries matched");
                return Ok(Vec::new());
            }

            let mut written = Vec::new();
            let mut failures: Vec<RebundleError> = Vec::new();
            for entry in &entries {
                match self.compile_one(writer, entry, ctx).await {
                    Ok(path) => written.extend(path),
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        error!(task = %self.id, entry = %ctx.rel(&entry.path), error = %err, "style compilation failed");
                        failures.push(err);
                    }
                }
            }

            info!(task = %self.id, entries = entries.len(), changed = written.len(), "compiled styles");

            let failed = failures.len();
            match failures.into_iter().next() {
                None => Ok(written),
                Some(first) => Err(RebundleError::EntriesFailed {
                    failed,
                    total: entries.len(),
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

    fn ctx(fs: &MockFileSystem) -> TaskContext {
        let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
        TaskContext::new(Path::new("."), &loader::builtin().unwrap(), RunMode::Once, shared)
    }

    #[tokio::test]
    async fn partials_are_not_compiled() {
        let fs = MockFileSystem::new();
        fs.add_file("static/css/main.css", "body {}");
        fs.add_file("static/css/_vars.css", ":root {}");
        fs.add_file("static/css/pages/about.css", "h1 {}");

        let action = StylesAction::new(
            TaskId::new("postcss"),
            PatternSet::new(&["./static/css/**/*.css", "!./static/css/**/_*.css"]).unwrap(),
            "css".to_string(),
            Arc::new(Passthrough),
        );
        let written = action.run(&ctx(&fs)).await.unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(fs.contents("build/css/main.css").as_deref(), Some("body {}"));
        assert_eq!(fs.contents("build/css/pages/about.css").as_deref(), Some("h1 {}"));
        assert!(fs.contents("build/css/_vars.css").is_none());
    }

    #[test]
    fn command_placeholders_are_quoted() {
        let c = CommandCompiler::new("postcss {input} -o {output}".to_string());
        assert_eq!(
            c.render("static/css/my file.css", "build/css/a.css"),
            "postcss 'static/css/my file.css' -o build/css/a.css"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_stdout_becomes_the_output() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("static/css")).unwrap();
        std::fs::write(root.join("static/css/main.css"), "a {}").unwrap();

        let shared: Arc<dyn FileSystem> = Arc::new(crate::fs::RealFileSystem);
        let ctx = TaskContext::new(&root, &loader::builtin().unwrap(), RunMode::Once, shared);
        let action = StylesAction::new(
            TaskId::new("postcss"),
            PatternSet::new(&["static/css/*.css"]).unwrap(),
            "css".to_string(),
            Arc::new(CommandCompiler::new("tr a b < {input}".to_string())),
        );
        action.run(&ctx).await.unwrap();
        assert_eq!(std::fs::read_to_string(root.join("build/css/main.css")).unwrap(), "b {}");
    }
}
