// src/types.rs

use std::borrow::Borrow;
use std::fmt;

/// Typed task identifier.
///
/// Task names come from `[task.<name>]` sections; everything past config
/// loading refers to tasks through this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(name: impl Into<String>) -> Self {
        TaskId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

/// How a task relates to process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Runs to completion (success or failure).
    Finite,
    /// Starts background work and is complete as soon as that work started;
    /// the background work itself may never terminate.
    Continuous,
}

/// Which command the process is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run the task graph once and exit; any failure is a non-zero exit.
    Once,
    /// Run the task graph once, then keep watching and rebuilding.
    Watch,
}

impl RunMode {
    pub fn failure_policy(self) -> FailurePolicy {
        match self {
            RunMode::Once => FailurePolicy::Strict,
            RunMode::Watch => FailurePolicy::BestEffort,
        }
    }

    pub fn is_watch(self) -> bool {
        matches!(self, RunMode::Watch)
    }
}

/// What a failed dependency means for its dependents.
///
/// - `Strict`: dependents are skipped and never start.
/// - `BestEffort`: a dependency that completed at all (even failed) releases
///   its dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Strict,
    BestEffort,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Strict
    }
}
