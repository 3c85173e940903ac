// src/tasks/notifier.rs

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::command::{run_shell, shell_quote};
use crate::tasks::{TaskAction, TaskContext};
use crate::types::TaskId;
use crate::watch::RebuildNotice;

/// Reports successful rebuilds, optionally through a command run with
/// `{files}` replaced by the rewritten outputs.
///
/// Continuous. Detached in production mode and outside watch mode.
#[derive(Debug)]
pub struct NotifierAction {
    id: TaskId,
    cmd: Option<String>,
}

impl NotifierAction {
    pub fn new(id: TaskId, cmd: Option<String>) -> Self {
        Self { id, cmd }
    }
}

/// `cmd` with `{files}` replaced by the quoted, root-relative outputs.
pub fn render_notify_command(cmd: &str, notice: &RebuildNotice, ctx: &TaskContext) -> String {
    let files: Vec<String> = notice
        .files
        .iter()
        .map(|f| shell_quote(&ctx.rel(f)))
        .collect();
    cmd.replace("{files}", &files.join(" "))
}

impl TaskAction for NotifierAction {
    fn run<'a>(
        &'a self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
        Box::pin(async move {
            if ctx.production {
                info!(task = %self.id, "production mode; notifier detached");
                return Ok(Vec::new());
            }
            let Some(watch) = &ctx.watch else {
                debug!(task = %self.id, "not watching; notifier idle");
                return Ok(Vec::new());
            };

            let mut notices = watch.notices();
            let id = self.id.clone();
            let cmd = self.cmd.clone();
            let ctx = ctx.clone();

            tokio::spawn(async move {
                loop {
                    match notices.recv().await {
                        Ok(notice) => {
                            let files: Vec<String> =
                                notice.files.iter().map(|f| ctx.rel(f)).collect();
                            info!(task = %id, source = %notice.target, ?files, "reload");
                            if let Some(cmd) = &cmd {
                                let rendered = render_notify_command(cmd, &notice, &ctx);
                                if let Err(err) = run_shell(id.as_str(), &rendered, &ctx.root).await {
                                    warn!(task = %id, error = %format!("{err:#}"), "notify command failed");
                                }
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(task = %id, skipped, "notifier fell behind; some rebuilds not reported");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                debug!(task = %id, "notifier stopped");
            });

            info!(task = %self.id, "notifier attached");
            Ok(Vec::new())
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

    #[test]
    fn files_placeholder_lists_relative_outputs() {
        let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
        let ctx = TaskContext::new(Path::new("/p"), &loader::builtin().unwrap(), RunMode::Watch, fs);
        let notice = RebuildNotice {
            target: "static/js/main.js".to_string(),
            files: vec![PathBuf::from("/p/build/js/main.js"), PathBuf::from("/p/build/js/main.js.map")],
        };
        assert_eq!(
            render_notify_command("touch {files}", &notice, &ctx),
            "touch build/js/main.js build/js/main.js.map"
        );
    }
}
