// src/dag/state_manager.rs

//! Per-run state transitions for tasks in the scheduler.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::dag::TaskGraph;
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::types::{FailurePolicy, TaskId};

/// Whether a pending task may start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Waiting,
    /// A dependency failed or was skipped (strict policy only).
    Blocked { because: TaskId },
}

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    graph: &'a TaskGraph,
    tasks: &'a mut BTreeMap<TaskId, TaskInfo>,
    policy: FailurePolicy,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a TaskGraph,
        tasks: &'a mut BTreeMap<TaskId, TaskInfo>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            graph,
            tasks,
            policy,
        }
    }

    /// Mark every pending dependent of `failed_task` in this run (and their
    /// pending dependents, transitively) as skipped.
    ///
    /// Returns the newly skipped tasks.
    pub fn mark_dependents_skipped(&mut self, failed_task: &TaskId) -> Vec<TaskId> {
        let mut stack: Vec<TaskId> = self.graph.dependents_of(failed_task.as_str()).to_vec();
        let mut newly_skipped = Vec::new();

        while let Some(id) = stack.pop() {
            // Tasks outside the requested closure are not in `tasks`.
            let Some(info) = self.tasks.get_mut(&id) else {
                continue;
            };
            if info.run_state == RunState::Pending {
                info.run_state = RunState::Skipped {
                    because: failed_task.clone(),
                };
                warn!(
                    task = %info.id,
                    because = %failed_task,
                    "skipping task; a dependency failed"
                );
                newly_skipped.push(info.id.clone());
                stack.extend(self.graph.dependents_of(id.as_str()).iter().cloned());
            }
        }

        newly_skipped
    }

    /// Collect tasks that are `Pending` and whose dependencies are satisfied,
    /// mark them as `Running`, and return them in id order.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let ro = ReadOnlyStateManager::new(self.tasks, self.policy);

        // Decide first, then mutate to avoid borrowing issues.
        let candidates: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|info| info.run_state == RunState::Pending)
            .filter(|info| ro.readiness(info) == Readiness::Ready)
            .map(|info| info.id.clone())
            .collect();

        let mut ready = Vec::with_capacity(candidates.len());
        for id in candidates {
            if let Some(info) = self.tasks.get_mut(&id) {
                info!(task = %info.id, kind = ?info.kind, "starting task");
                debug!(task = %info.id, "dependencies satisfied; marking Running");
                info.run_state = RunState::Running;
                ready.push(ScheduledTask::from_task_info(info));
            }
        }

        ready
    }

    /// Check if all tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks.values().all(|info| info.run_state.is_terminal())
    }
}

/// A read-only view of per-run state for checking dependency satisfaction.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a BTreeMap<TaskId, TaskInfo>,
    policy: FailurePolicy,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a BTreeMap<TaskId, TaskInfo>, policy: FailurePolicy) -> Self {
        Self { tasks, policy }
    }

    /// Whether `info` may start now under the run's failure policy.
    pub fn readiness(&self, info: &TaskInfo) -> Readiness {
        let mut waiting = false;

        for dep_id in &info.deps {
            let Some(dep) = self.tasks.get(dep_id) else {
                warn!(
                    task = %info.id,
                    dep = %dep_id,
                    "dependency missing from run; treating as unsatisfied"
                );
                return Readiness::Waiting;
            };

            match (&dep.run_state, self.policy) {
                (RunState::Succeeded, _) => {}
                (RunState::Pending | RunState::Running, _) => waiting = true,
                (RunState::Failed { .. }, FailurePolicy::Strict) => {
                    return Readiness::Blocked {
                        because: dep.id.clone(),
                    };
                }
                (RunState::Skipped { because }, FailurePolicy::Strict) => {
                    return Readiness::Blocked {
                        because: because.clone(),
                    };
                }
                (RunState::Failed { .. } | RunState::Skipped { .. }, FailurePolicy::BestEffort) => {}
            }
        }

        if waiting {
            Readiness::Waiting
        } else {
            Readiness::Ready
        }
    }
}
