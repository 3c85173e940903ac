// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `rebundle`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rebundle",
    version,
    about = "Incremental script bundler driven by a task graph.",
    long_about = None
)]
pub struct CliArgs {
    /// What to do. Defaults to `watch`.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the config file (TOML).
    ///
    /// When the default file does not exist, the built-in configuration is
    /// used.
    #[arg(long, global = true, value_name = "PATH", default_value = "Rebundle.toml")]
    pub config: String,

    /// Production build: dynamic `require` is an error and notifiers stay
    /// detached.
    #[arg(long, global = true)]
    pub production: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `REBUNDLE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Remove the output directory.
    Clean,
    /// Build everything once; exit non-zero if any task failed.
    Build,
    /// Build, then rebuild on every change until Ctrl-C.
    Watch,
    /// Run one task (and its dependencies) once.
    Run {
        /// Task name from the config.
        task: String,
    },
    /// Print the validated task graph without running anything.
    List,
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Watch)
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_is_the_default_command() {
        let args = CliArgs::try_parse_from(["rebundle"]).unwrap();
        assert_eq!(args.command(), Command::Watch);
        assert_eq!(args.config, "Rebundle.toml");
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let args =
            CliArgs::try_parse_from(["rebundle", "run", "lint", "--production", "--config", "x.toml"])
                .unwrap();
        assert_eq!(
            args.command(),
            Command::Run {
                task: "lint".to_string()
            }
        );
        assert!(args.production);
        assert_eq!(args.config, "x.toml");
    }
}
