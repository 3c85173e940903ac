// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::dag::TaskGraph;
use crate::types::TaskKind;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// output_dir = "build"
/// debounce_ms = 100
///
/// [resolve]
/// extensions = [".js", ".json"]
///
/// [task.browserify]
/// kind = "bundle"
/// entries = ["./static/js/*.js"]
/// dest = "js"
///
/// [task.build]
/// kind = "group"
/// after = ["browserify"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Module resolution settings from `[resolve]`.
    #[serde(default)]
    pub resolve: ResolveSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holding one means the
/// task graph is known to be acyclic and every reference resolves.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub resolve: ResolveSection,
    task: BTreeMap<String, TaskConfig>,
    graph: TaskGraph,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        resolve: ResolveSection,
        task: BTreeMap<String, TaskConfig>,
        graph: TaskGraph,
    ) -> Self {
        Self {
            config,
            resolve,
            task,
            graph,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn resolve_section(&self) -> &ResolveSection {
        &self.resolve
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.get(name)
    }

    /// The validated task graph.
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Root of the output tree, relative to the project root.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Production mode: dynamic `require` is an error and notifiers detach.
    #[serde(default)]
    pub production: bool,

    /// Quiet period before a watch target rebuilds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Directory names never descended into while expanding globs.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_ignore_dirs() -> Vec<String> {
    vec!["node_modules".to_string(), ".git".to_string()]
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            production: false,
            debounce_ms: default_debounce_ms(),
            ignore_dirs: default_ignore_dirs(),
        }
    }
}

/// `[resolve]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveSection {
    /// Extensions probed, in order, when a specifier names no existing file.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names searched in every ancestor for logical names.
    #[serde(default = "default_module_dirs")]
    pub module_dirs: Vec<String>,

    /// Extra search roots for logical names, relative to the project root.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

fn default_extensions() -> Vec<String> {
    vec![".js".to_string(), ".json".to_string()]
}

fn default_module_dirs() -> Vec<String> {
    vec!["node_modules".to_string()]
}

impl Default for ResolveSection {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            module_dirs: default_module_dirs(),
            paths: Vec::new(),
        }
    }
}

/// What a task does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKindConfig {
    /// Remove the output directory.
    Clean,
    /// Run a shell command (`cmd`).
    Command,
    /// Copy `files` into `<output_dir>/<dest>`.
    Copy,
    /// Compile style `entries` into `<output_dir>/<dest>`.
    Styles,
    /// Bundle script `entries` into `<output_dir>/<dest>`.
    Bundle,
    /// Re-run `run` whenever a file matching `patterns` changes.
    Watch,
    /// Report successful rebuilds.
    Notifier,
    /// No action of its own; only orders its `after` list.
    Group,
}

impl TaskKindConfig {
    /// Watch and notifier tasks only start background work.
    pub fn task_kind(self) -> TaskKind {
        match self {
            TaskKindConfig::Watch | TaskKindConfig::Notifier => TaskKind::Continuous,
            _ => TaskKind::Finite,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKindConfig::Clean => "clean",
            TaskKindConfig::Command => "command",
            TaskKindConfig::Copy => "copy",
            TaskKindConfig::Styles => "styles",
            TaskKindConfig::Bundle => "bundle",
            TaskKindConfig::Watch => "watch",
            TaskKindConfig::Notifier => "notifier",
            TaskKindConfig::Group => "group",
        }
    }
}

/// `[task.<name>]` section.
///
/// Fields other than `kind` and `after` are only meaningful for some kinds;
/// validation rejects missing required ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub kind: TaskKindConfig,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Shell command (`command`, optional for `styles` and `notifier`).
    #[serde(default)]
    pub cmd: Option<String>,

    /// Source globs for `copy`.
    #[serde(default)]
    pub files: Vec<String>,

    /// Entry globs for `styles` and `bundle`.
    #[serde(default)]
    pub entries: Vec<String>,

    /// Trigger globs for `watch`.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Task re-run by a `watch` task.
    #[serde(default)]
    pub run: Option<String>,

    /// Subdirectory of the output tree.
    #[serde(default)]
    pub dest: Option<String>,

    /// Source maps and per-module path comments for `bundle`.
    #[serde(default)]
    pub debug: Option<bool>,
}

impl TaskConfig {
    pub fn new(kind: TaskKindConfig) -> Self {
        Self {
            kind,
            after: Vec::new(),
            cmd: None,
            files: Vec::new(),
            entries: Vec::new(),
            patterns: Vec::new(),
            run: None,
            dest: None,
            debug: None,
        }
    }

    pub fn effective_debug(&self) -> bool {
        self.debug.unwrap_or(true)
    }

    /// Output subdirectory, defaulting per asset kind.
    pub fn effective_dest(&self) -> &str {
        match (&self.dest, self.kind) {
            (Some(d), _) => d.as_str(),
            (None, TaskKindConfig::Copy) => "vendor",
            (None, TaskKindConfig::Styles) => "css",
            (None, TaskKindConfig::Bundle) => "js",
            (None, _) => "",
        }
    }
}
