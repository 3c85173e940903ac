// src/errors.rs

//! Crate-wide error type and helpers.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum RebundleError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {}", format_cycle(.0))]
    DagCycle(Vec<TaskId>),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A glob pattern, a file path or a `require`d name could not be
    /// resolved to an existing file.
    #[error("cannot resolve '{specifier}'{}", required_by(.parent))]
    Resolution {
        specifier: String,
        parent: Option<PathBuf>,
    },

    /// A source file's dependency syntax could not be analysed.
    #[error(
        "parse error in {}:{line}:{column}: {message}{}",
        .path.display(),
        required_by(.parent)
    )]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
        parent: Option<PathBuf>,
    },

    /// The output tree could not be written.
    #[error("failed to write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },

    /// Some entries of a multi-entry task failed; the first error is kept
    /// for the report, every error has already been logged.
    #[error("{failed} of {total} entries failed; first error: {first}")]
    EntriesFailed {
        failed: usize,
        total: usize,
        first: Box<RebundleError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RebundleError {
    pub fn resolution(specifier: impl Into<String>, parent: Option<&Path>) -> Self {
        RebundleError::Resolution {
            specifier: specifier.into(),
            parent: parent.map(Path::to_path_buf),
        }
    }

    /// Whether this error must stop the process regardless of run mode.
    ///
    /// Resolution and parse errors are scoped to a single entry; everything
    /// that means the configuration or the output tree is broken is fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            RebundleError::Resolution { .. } | RebundleError::Parse { .. } => false,
            RebundleError::EntriesFailed { first, .. } => first.is_fatal(),
            RebundleError::Other(_) => false,
            RebundleError::ConfigError(_)
            | RebundleError::IoError(_)
            | RebundleError::TaskNotFound(_)
            | RebundleError::DagCycle(_)
            | RebundleError::TomlError(_)
            | RebundleError::Write { .. } => true,
        }
    }
}

fn format_cycle(cycle: &[TaskId]) -> String {
    let mut names: Vec<&str> = cycle.iter().map(TaskId::as_str).collect();
    if let Some(first) = names.first().copied() {
        names.push(first);
    }
    names.join(" -> ")
}

fn required_by(parent: &Option<PathBuf>) -> String {
    match parent {
        Some(p) => format!(" (required by {})", p.display()),
        None => String::new(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RebundleError>;
