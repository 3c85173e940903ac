use std::collections::BTreeMap;
use std::path::PathBuf;

use rebundle::config::{
    ConfigFile, ConfigSection, RawConfigFile, ResolveSection, TaskConfig, TaskKindConfig,
};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                resolve: ResolveSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn output_dir(mut self, dir: &str) -> Self {
        self.config.config.output_dir = PathBuf::from(dir);
        self
    }

    pub fn production(mut self, val: bool) -> Self {
        self.config.config.production = val;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    /// The raw file, for tests exercising validation failures.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("builder produced an invalid config")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(kind: TaskKindConfig) -> Self {
        Self {
            task: TaskConfig::new(kind),
        }
    }

    /// A group task: no action, only ordering.
    pub fn group() -> Self {
        Self::new(TaskKindConfig::Group)
    }

    pub fn command(cmd: &str) -> Self {
        Self::new(TaskKindConfig::Command).cmd(cmd)
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.task.cmd = Some(cmd.to_string());
        self
    }

    pub fn file(mut self, pattern: &str) -> Self {
        self.task.files.push(pattern.to_string());
        self
    }

    pub fn entry(mut self, pattern: &str) -> Self {
        self.task.entries.push(pattern.to_string());
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.task.patterns.push(pattern.to_string());
        self
    }

    pub fn run(mut self, task: &str) -> Self {
        self.task.run = Some(task.to_string());
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.task.dest = Some(dest.to_string());
        self
    }

    pub fn debug(mut self, val: bool) -> Self {
        self.task.debug = Some(val);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
