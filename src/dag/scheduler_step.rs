// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::ScheduledTask;
use crate::types::TaskId;

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step the scheduler and
/// make assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks newly marked failed in this step (at most the completed task).
    pub newly_failed: Vec<TaskId>,
    /// Tasks newly marked skipped because of an upstream failure.
    pub newly_skipped: Vec<TaskId>,
    /// Whether this step put every task of the run in a terminal state.
    pub run_just_finished: bool,
}
