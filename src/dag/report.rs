// src/dag/report.rs

use std::fmt;

use crate::types::TaskId;

/// Final per-task summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: Vec<TaskId>,
    /// Failed tasks with their error message.
    pub failed: Vec<(TaskId, String)>,
    /// Skipped tasks with the failed dependency that blocked them.
    pub skipped: Vec<(TaskId, TaskId)>,
    /// Tasks still pending or running when the run stopped (shutdown or a
    /// fatal error).
    pub incomplete: Vec<TaskId>,
    /// Message of the fatal error that stopped the process, if any.
    pub fatal: Option<String>,
}

impl RunReport {
    /// Every task in the requested graph succeeded and nothing fatal happened.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
            && self.skipped.is_empty()
            && self.incomplete.is_empty()
            && self.fatal.is_none()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped",
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len()
        )?;
        if !self.incomplete.is_empty() {
            write!(f, ", {} incomplete", self.incomplete.len())?;
        }
        for (task, message) in &self.failed {
            write!(f, "\n  failed: {task}: {message}")?;
        }
        for (task, because) in &self.skipped {
            write!(f, "\n  skipped: {task} (dependency '{because}' failed)")?;
        }
        if let Some(fatal) = &self.fatal {
            write!(f, "\n  fatal: {fatal}")?;
        }
        Ok(())
    }
}
