// src/tasks/mod.rs

//! Task actions: what each configured task kind actually does.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::bundle::ResolveOptions;
use crate::config::{ConfigFile, TaskConfig, TaskKindConfig};
use crate::errors::{RebundleError, Result};
use crate::fs::{FileSystem, normalize_path, rel_string};
use crate::types::{RunMode, TaskId};
use crate::watch::{MatchedFile, PatternSet, WalkFilter, WatchSubscriber};

pub mod bundle;
pub mod clean;
pub mod command;
pub mod copy;
pub mod group;
pub mod notifier;
pub mod styles;
pub mod watch;

pub use bundle::BundleAction;
pub use clean::CleanAction;
pub use command::CommandAction;
pub use copy::CopyAction;
pub use group::GroupAction;
pub use notifier::NotifierAction;
pub use styles::{CommandCompiler, Passthrough, StyleCompiler, StylesAction};
pub use watch::WatchAction;

/// The work behind one task.
///
/// Finite actions resolve when their work is done. Continuous actions
/// resolve as soon as their background work is running. The returned paths
/// are the output files written by this run.
pub trait TaskAction: Send + Sync {
    fn run<'a>(
        &'a self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>>;
}

/// Actions by task id.
pub type ActionRegistry = Arc<HashMap<TaskId, Arc<dyn TaskAction>>>;

/// Everything an action may touch, shared by all tasks of a run.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Project root; every path an action produces is below it.
    pub root: PathBuf,
    /// `<root>/<output_dir>`.
    pub output_dir: PathBuf,
    pub mode: RunMode,
    pub production: bool,
    pub walk: WalkFilter,
    pub resolve: ResolveOptions,
    pub fs: Arc<dyn FileSystem>,
    /// Present in watch mode.
    pub watch: Option<WatchSubscriber>,
}

impl TaskContext {
    pub fn new(root: &Path, config: &ConfigFile, mode: RunMode, fs: Arc<dyn FileSystem>) -> Self {
        let root = normalize_path(root);
        let section = config.config_section();
        let output_dir = normalize_path(&root.join(&section.output_dir));
        Self {
            walk: WalkFilter::new(section.ignore_dirs.clone(), vec![output_dir.clone()]),
            resolve: ResolveOptions::from_section(config.resolve_section(), &root),
            production: section.production,
            output_dir,
            root,
            mode,
            fs,
            watch: None,
        }
    }

    pub fn with_watch(mut self, watch: WatchSubscriber) -> Self {
        self.watch = Some(watch);
        self
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = self.production || production;
        self
    }

    /// `<output_dir>/<dest>`.
    pub fn dest_dir(&self, dest: &str) -> PathBuf {
        normalize_path(&self.output_dir.join(dest))
    }

    /// Path relative to the project root, for logs and commands.
    pub fn rel(&self, path: &Path) -> String {
        rel_string(&self.root, path)
    }

    /// Existing files matching `patterns`, sorted.
    pub fn collect(&self, patterns: &PatternSet) -> Result<Vec<MatchedFile>> {
        Ok(patterns.collect(self.fs.as_ref(), &self.root, &self.walk)?)
    }
}

fn patterns(name: &str, field: &str, globs: &[String]) -> Result<PatternSet> {
    PatternSet::new(globs)
        .map_err(|e| RebundleError::ConfigError(format!("task '{name}': invalid `{field}`: {e:#}")))
}

fn first_pass_action(name: &str, task: &TaskConfig) -> Result<Option<Arc<dyn TaskAction>>> {
    let id = TaskId::new(name);
    let action: Arc<dyn TaskAction> = match task.kind {
        TaskKindConfig::Clean => Arc::new(CleanAction::new(id)),
        TaskKindConfig::Command => {
            let cmd = task.cmd.clone().ok_or_else(|| {
                RebundleError::ConfigError(format!("task '{name}' has no `cmd`"))
            })?;
            Arc::new(CommandAction::new(id, cmd))
        }
        TaskKindConfig::Copy => Arc::new(CopyAction::new(
            id,
            patterns(name, "files", &task.files)?,
            task.effective_dest().to_string(),
        )),
        TaskKindConfig::Styles => {
            let compiler: Arc<dyn StyleCompiler> = match &task.cmd {
                Some(cmd) => Arc::new(CommandCompiler::new(cmd.clone())),
                None => Arc::new(Passthrough),
            };
            Arc::new(StylesAction::new(
                id,
                patterns(name, "entries", &task.entries)?,
                task.effective_dest().to_string(),
                compiler,
            ))
        }
        TaskKindConfig::Bundle => Arc::new(BundleAction::new(
            id,
            patterns(name, "entries", &task.entries)?,
            task.effective_dest().to_string(),
            task.effective_debug(),
        )),
        TaskKindConfig::Notifier => Arc::new(NotifierAction::new(id, task.cmd.clone())),
        TaskKindConfig::Group => Arc::new(GroupAction),
        // Needs the action it re-runs.
        TaskKindConfig::Watch => return Ok(None),
    };
    Ok(Some(action))
}

/// Build the action of every configured task.
pub fn build_task_set(config: &ConfigFile) -> Result<ActionRegistry> {
    let mut actions: HashMap<TaskId, Arc<dyn TaskAction>> = HashMap::new();

    for (name, task) in config.tasks() {
        if let Some(action) = first_pass_action(name, task)? {
            actions.insert(TaskId::new(name), action);
        }
    }

    for (name, task) in config.tasks() {
        if task.kind != TaskKindConfig::Watch {
            continue;
        }
        let run = task
            .run
            .as_deref()
            .ok_or_else(|| RebundleError::ConfigError(format!("task '{name}' has no `run`")))?;
        let target = actions.get(run).cloned().ok_or_else(|| {
            RebundleError::ConfigError(format!(
                "watch task '{name}' cannot re-run '{run}': only non-watch tasks can be re-run"
            ))
        })?;
        let action = WatchAction::new(
            TaskId::new(name),
            patterns(name, "patterns", &task.patterns)?,
            TaskId::new(run),
            target,
        );
        actions.insert(TaskId::new(name), Arc::new(action));
    }

    Ok(Arc::new(actions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader;

    #[test]
    fn builtin_config_has_an_action_per_task() {
        let cfg = loader::builtin().unwrap();
        let actions = build_task_set(&cfg).unwrap();
        assert_eq!(actions.len(), cfg.tasks().len());
        assert!(actions.contains_key("watch-css"));
    }

    #[test]
    fn watch_cannot_rerun_another_watch() {
        let raw = loader::load_from_str(
            r#"
            [task.a]
            kind = "watch"
            patterns = ["*.css"]
            run = "b"

            [task.b]
            kind = "watch"
            patterns = ["*.js"]
            run = "c"

            [task.c]
            kind = "group"
            "#,
        )
        .unwrap();
        let cfg = ConfigFile::try_from(raw).unwrap();
        assert!(matches!(build_task_set(&cfg), Err(RebundleError::ConfigError(_))));
    }

    #[test]
    fn context_paths_hang_off_the_root() {
        let cfg = loader::builtin().unwrap();
        let fs: Arc<dyn FileSystem> = Arc::new(crate::fs::mock::MockFileSystem::new());
        let ctx = TaskContext::new(Path::new("/project"), &cfg, RunMode::Once, fs);
        assert_eq!(ctx.output_dir, PathBuf::from("/project/build"));
        assert_eq!(ctx.dest_dir("vendor/shims"), PathBuf::from("/project/build/vendor/shims"));
        assert_eq!(ctx.rel(Path::new("/project/static/js/a.js")), "static/js/a.js");
    }
}
