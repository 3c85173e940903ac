// src/lib.rs

pub mod bundle;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod output;
pub mod tasks;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::ConfigFile;
use crate::config::loader::load_or_builtin;
use crate::dag::{RunReport, Scheduler};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::exec::RealExecutorBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::tasks::{TaskContext, build_task_set};
use crate::types::{RunMode, TaskId};
use crate::watch::{WatchSubscriber, spawn_watcher};

/// What a command ended with; `main` turns this into an exit code.
#[derive(Debug)]
pub enum Finished {
    /// `list` printed the graph.
    Listed,
    Ran { mode: RunMode, report: RunReport },
}

impl Finished {
    /// Once: every task succeeded. Watch: nothing fatal stopped the process.
    pub fn is_success(&self) -> bool {
        match self {
            Finished::Listed => true,
            Finished::Ran {
                mode: RunMode::Once,
                report,
            } => report.is_success(),
            Finished::Ran {
                mode: RunMode::Watch,
                report,
            } => report.fatal.is_none(),
        }
    }
}

/// Task and mode for a command; `None` for commands that run nothing.
pub fn target_for(command: &Command) -> Option<(TaskId, RunMode)> {
    match command {
        Command::Clean => Some((TaskId::new("clean"), RunMode::Once)),
        Command::Build => Some((TaskId::new("build"), RunMode::Once)),
        Command::Watch => Some((TaskId::new("default"), RunMode::Watch)),
        Command::Run { task } => Some((TaskId::new(task.as_str()), RunMode::Once)),
        Command::List => None,
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - task actions / scheduler / runtime
/// - executor
/// - (watch mode) subscriber and file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<Finished> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_or_builtin(&config_path)?;

    let command = args.command();
    let Some((target, mode)) = target_for(&command) else {
        print_graph(&cfg);
        return Ok(Finished::Listed);
    };

    let root = project_root(&config_path);
    info!(root = %root.display(), run_target = %target, ?mode, "starting");

    // Fails before anything runs when the target is unknown.
    let scheduler = Scheduler::new(cfg.graph().clone(), target, mode.failure_policy())?;
    let actions = build_task_set(&cfg)?;

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut ctx = TaskContext::new(&root, &cfg, mode, fs).with_production(args.production);

    let _watcher_handle = if mode.is_watch() {
        let debounce = Duration::from_millis(cfg.config_section().debounce_ms);
        let subscriber = WatchSubscriber::new(&root, debounce, rt_tx.clone());
        ctx = ctx.with_watch(subscriber.clone());
        Some(spawn_watcher(subscriber)?)
    } else {
        None
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let executor = RealExecutorBackend::new(actions, Arc::new(ctx), rt_tx);
    let core = CoreRuntime::new(scheduler, RuntimeOptions { mode });
    let report = Runtime::new(core, rt_rx, executor).run().await?;

    if report.is_success() {
        info!("run finished: {report}");
    } else {
        warn!("run finished: {report}");
    }
    Ok(Finished::Ran { mode, report })
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "web/Rebundle.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Rebundle.toml" (parent = ""),
///   we fall back to the current working directory.
///
/// The result is canonical so watcher events and entry paths agree.
fn project_root(config_path: &Path) -> PathBuf {
    let dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    dir.canonicalize().unwrap_or(dir)
}

/// Print the validated task graph, dependencies first.
fn print_graph(cfg: &ConfigFile) {
    let section = cfg.config_section();
    println!("[config]");
    println!("  output_dir = {}", section.output_dir.display());
    println!("  production = {}", section.production);
    println!("  debounce_ms = {}", section.debounce_ms);
    println!();

    let graph = cfg.graph();
    println!("tasks ({}):", graph.len());
    for id in graph.topological_order() {
        let Some(task) = cfg.task(id.as_str()) else {
            continue;
        };
        println!("  - {id} ({})", task.kind.as_str());
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if let Some(cmd) = &task.cmd {
            println!("      cmd: {cmd}");
        }
        for (label, globs) in [
            ("files", &task.files),
            ("entries", &task.entries),
            ("patterns", &task.patterns),
        ] {
            if !globs.is_empty() {
                println!("      {label}: {globs:?}");
            }
        }
        if let Some(run) = &task.run {
            println!("      run: {run}");
        }
        let dest = task.effective_dest();
        if !dest.is_empty() {
            println!("      dest: {dest}");
        }
    }

    debug!("list complete (no execution)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_map_to_targets() {
        assert_eq!(
            target_for(&Command::Build),
            Some((TaskId::new("build"), RunMode::Once))
        );
        assert_eq!(
            target_for(&Command::Watch),
            Some((TaskId::new("default"), RunMode::Watch))
        );
        assert_eq!(target_for(&Command::List), None);
    }

    #[test]
    fn watch_mode_only_fails_on_fatal_errors() {
        let report = RunReport {
            failed: vec![(TaskId::new("browserify"), "parse error".into())],
            ..RunReport::default()
        };
        let watch = Finished::Ran {
            mode: RunMode::Watch,
            report: report.clone(),
        };
        let once = Finished::Ran {
            mode: RunMode::Once,
            report,
        };
        assert!(watch.is_success());
        assert!(!once.is_success());
    }
}
