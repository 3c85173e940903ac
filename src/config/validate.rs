// src/config/validate.rs

use std::path::{Component, Path};

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig, TaskKindConfig};
use crate::dag::{TaskGraph, TaskSpec};
use crate::errors::{RebundleError, Result};
use crate::types::TaskId;
use crate::watch::patterns::PatternSet;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RebundleError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let graph = build_graph(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.resolve, raw.task, graph))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    for (name, task) in cfg.task.iter() {
        validate_task(cfg, name, task)?;
    }
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(RebundleError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.debounce_ms == 0 {
        return Err(RebundleError::ConfigError(
            "[config].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.output_dir.as_os_str().is_empty() {
        return Err(RebundleError::ConfigError(
            "[config].output_dir must not be empty".to_string(),
        ));
    }
    if cfg.resolve.extensions.iter().any(|e| !e.starts_with('.')) {
        return Err(RebundleError::ConfigError(
            "[resolve].extensions entries must start with '.'".to_string(),
        ));
    }
    Ok(())
}

fn validate_task(cfg: &RawConfigFile, name: &str, task: &TaskConfig) -> Result<()> {
    let missing = |field: &str| {
        RebundleError::ConfigError(format!(
            "task '{}' of kind '{}' requires `{}`",
            name,
            task.kind.as_str(),
            field
        ))
    };

    match task.kind {
        TaskKindConfig::Command => {
            if task.cmd.as_deref().is_none_or(|c| c.trim().is_empty()) {
                return Err(missing("cmd"));
            }
        }
        TaskKindConfig::Copy => {
            if task.files.is_empty() {
                return Err(missing("files"));
            }
            check_globs(name, "files", &task.files)?;
        }
        TaskKindConfig::Styles | TaskKindConfig::Bundle => {
            if task.entries.is_empty() {
                return Err(missing("entries"));
            }
            check_globs(name, "entries", &task.entries)?;
        }
        TaskKindConfig::Watch => {
            if task.patterns.is_empty() {
                return Err(missing("patterns"));
            }
            check_globs(name, "patterns", &task.patterns)?;
            let run = task.run.as_deref().ok_or_else(|| missing("run"))?;
            if run == name {
                return Err(RebundleError::ConfigError(format!(
                    "watch task '{}' cannot re-run itself",
                    name
                )));
            }
            if !cfg.task.contains_key(run) {
                return Err(RebundleError::ConfigError(format!(
                    "watch task '{}' re-runs unknown task '{}'",
                    name, run
                )));
            }
        }
        TaskKindConfig::Clean | TaskKindConfig::Notifier | TaskKindConfig::Group => {}
    }

    if let Some(dest) = &task.dest {
        if !is_plain_relative(Path::new(dest)) {
            return Err(RebundleError::ConfigError(format!(
                "task '{}' has `dest = {:?}`; it must be a relative path inside the output directory",
                name, dest
            )));
        }
    }

    Ok(())
}

fn check_globs(task: &str, field: &str, patterns: &[String]) -> Result<()> {
    PatternSet::new(patterns).map_err(|e| {
        RebundleError::ConfigError(format!("task '{}' has an invalid `{}` glob: {:#}", task, field, e))
    })?;
    Ok(())
}

fn is_plain_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Unknown dependencies and cycles are detected by the graph itself.
fn build_graph(cfg: &RawConfigFile) -> Result<TaskGraph> {
    let specs = cfg.task.iter().map(|(name, task)| TaskSpec {
        id: TaskId::new(name.as_str()),
        deps: task.after.iter().map(|d| TaskId::new(d.as_str())).collect(),
        kind: task.kind.task_kind(),
    });
    TaskGraph::new(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_config_is_rejected() {
        let err = parse("").unwrap_err();
        assert!(matches!(err, RebundleError::ConfigError(_)));
    }

    #[test]
    fn bundle_requires_entries() {
        let err = parse("[task.js]\nkind = \"bundle\"\n").unwrap_err();
        assert!(err.to_string().contains("requires `entries`"), "{err}");
    }

    #[test]
    fn watch_must_reference_known_task() {
        let err = parse(
            r#"
            [task.w]
            kind = "watch"
            patterns = ["static/**/*.css"]
            run = "postcss"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown task 'postcss'"), "{err}");
    }

    #[test]
    fn dest_cannot_escape_output_dir() {
        let err = parse(
            r#"
            [task.copy]
            kind = "copy"
            files = ["a/*.css"]
            dest = "../elsewhere"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, RebundleError::ConfigError(_)));
    }

    #[test]
    fn cycle_is_reported_by_name() {
        let err = parse(
            r#"
            [task.a]
            kind = "group"
            after = ["b"]

            [task.b]
            kind = "group"
            after = ["a"]
            "#,
        )
        .unwrap_err();
        match err {
            RebundleError::DagCycle(cycle) => {
                let names: Vec<&str> = cycle.iter().map(TaskId::as_str).collect();
                assert_eq!(names.len(), 2);
                assert!(names.contains(&"a") && names.contains(&"b"));
            }
            other => panic!("expected DagCycle, got {other:?}"),
        }
    }

    #[test]
    fn zero_debounce_is_rejected() {
        let err = parse("[config]\ndebounce_ms = 0\n[task.g]\nkind = \"group\"\n").unwrap_err();
        assert!(err.to_string().contains("debounce_ms"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(parse("[task.g]\nkind = \"group\"\nwatch = []\n").is_err());
    }
}
