// src/dag/task_info.rs

//! Task metadata and per-run state.

use crate::types::{TaskId, TaskKind};

/// Per-run state of a task (internal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Waiting on dependencies.
    Pending,
    /// Dispatched to the executor.
    Running,
    Succeeded,
    /// The task's action returned an error.
    Failed { message: String },
    /// Never started because `because` (a dependency, possibly transitive)
    /// failed.
    Skipped { because: TaskId },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }
}

/// Public, read-only view of a task's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task is not part of the requested target's closure.
    NotInRun,
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl From<Option<&RunState>> for TaskRunState {
    fn from(state: Option<&RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::Succeeded) => TaskRunState::Succeeded,
            Some(RunState::Failed { .. }) => TaskRunState::Failed,
            Some(RunState::Skipped { .. }) => TaskRunState::Skipped,
        }
    }
}

/// Static task information plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: TaskId,
    pub kind: TaskKind,
    /// Direct dependencies (names in `after = [...]`).
    pub deps: Vec<TaskId>,
    pub run_state: RunState,
}

impl TaskInfo {
    pub fn new(id: TaskId, kind: TaskKind, deps: Vec<TaskId>) -> Self {
        Self {
            id,
            kind,
            deps,
            run_state: RunState::Pending,
        }
    }
}

/// A task the scheduler wants the executor to start now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub kind: TaskKind,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo) -> Self {
        Self {
            id: info.id.clone(),
            kind: info.kind,
        }
    }
}
