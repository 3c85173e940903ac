// src/dag/scheduler.rs

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::report::RunReport;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, Readiness, StateManager};
use crate::dag::task_info::{RunState, TaskInfo, TaskRunState};
use crate::engine::TaskOutcome;
use crate::errors::Result;
use crate::types::{FailurePolicy, TaskId};

/// Scheduler holds the validated graph plus the state of one run.
///
/// A run covers the requested target task and everything it transitively
/// depends on. The scheduler is responsible for:
/// - deciding when a task is ready (all dependencies terminal and satisfied
///   under the failure policy)
/// - marking tasks as succeeded / failed
/// - skipping dependents of a failed task (strict policy)
/// - starting each task at most once
#[derive(Debug)]
pub struct Scheduler {
    graph: TaskGraph,
    target: TaskId,
    tasks: BTreeMap<TaskId, TaskInfo>,
    policy: FailurePolicy,
    started: bool,
    finished: bool,
}

impl Scheduler {
    /// Prepare a run of `target`. Fails if `target` is not in the graph.
    pub fn new(graph: TaskGraph, target: TaskId, policy: FailurePolicy) -> Result<Self> {
        let closure = graph.closure_of(&target)?;

        let tasks = closure
            .into_iter()
            .map(|id| {
                let deps = graph.dependencies_of(id.as_str()).to_vec();
                let kind = graph
                    .kind_of(id.as_str())
                    .unwrap_or(crate::types::TaskKind::Finite);
                (id.clone(), TaskInfo::new(id, kind, deps))
            })
            .collect();

        Ok(Self {
            graph,
            target,
            tasks,
            policy,
            started: false,
            finished: false,
        })
    }

    pub fn target(&self) -> &TaskId {
        &self.target
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Ids of the tasks taking part in this run.
    pub fn tasks_in_run(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.keys()
    }

    /// Read-only view of the given task's run state.
    ///
    /// Returns `None` if the task is unknown to the graph.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        if !self.graph.contains(task) {
            return None;
        }
        Some(self.tasks.get(task).map(|info| &info.run_state).into())
    }

    /// Whether the dependencies of `task` allow it to start now.
    ///
    /// Returns `None` if the task is not part of this run.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        let ro = ReadOnlyStateManager::new(&self.tasks, self.policy);
        Some(ro.readiness(info) == Readiness::Ready)
    }

    /// Every task of the run is terminal.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Start the run: schedule every task without dependencies.
    pub fn start(&mut self) -> SchedulerStep {
        if self.started {
            warn!(run_target = %self.target, "run already started; ignoring");
            return SchedulerStep::default();
        }
        self.started = true;
        info!(run_target = %self.target, tasks = self.tasks.len(), "starting run");

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.policy);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            run_just_finished,
            ..SchedulerStep::default()
        }
    }

    /// Handle completion of a task with a concrete outcome (production API).
    pub fn handle_completion(&mut self, task: &str, outcome: &TaskOutcome) -> SchedulerStep {
        self.completion_step_internal(task, outcome)
    }

    /// Manual-step variant of `handle_completion`, for tests.
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        self.completion_step_internal(task, &outcome)
    }

    /// Snapshot of the run's results.
    pub fn report(&self) -> RunReport {
        let mut report = RunReport::default();
        for info in self.tasks.values() {
            match &info.run_state {
                RunState::Succeeded => report.succeeded.push(info.id.clone()),
                RunState::Failed { message } => {
                    report.failed.push((info.id.clone(), message.clone()))
                }
                RunState::Skipped { because } => {
                    report.skipped.push((info.id.clone(), because.clone()))
                }
                RunState::Pending | RunState::Running => report.incomplete.push(info.id.clone()),
            }
        }
        report
    }

    /// Returns `true` if this call transitioned the run to finished.
    fn maybe_finish_run(&mut self) -> bool {
        if self.finished {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.tasks, self.policy);
        if manager.all_tasks_terminal() {
            info!(run_target = %self.target, "all tasks terminal; run finished");
            self.finished = true;
            true
        } else {
            false
        }
    }

    fn completion_step_internal(&mut self, task: &str, outcome: &TaskOutcome) -> SchedulerStep {
        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "completion for task outside this run; ignoring");
            return SchedulerStep::default();
        };

        // Only a running task can complete, and only once.
        if info.run_state != RunState::Running {
            warn!(
                task = %task,
                state = ?info.run_state,
                "completion for task that is not running; ignoring"
            );
            return SchedulerStep::default();
        }

        let mut step = SchedulerStep::default();
        let id = info.id.clone();

        match outcome {
            TaskOutcome::Success => {
                info.run_state = RunState::Succeeded;
                debug!(task = %id, "task completed successfully");
            }
            TaskOutcome::Failed { message, .. } => {
                info.run_state = RunState::Failed {
                    message: message.clone(),
                };
                warn!(task = %id, error = %message, "task failed");
                step.newly_failed.push(id.clone());

                if self.policy == FailurePolicy::Strict {
                    let mut manager =
                        StateManager::new(&self.graph, &mut self.tasks, self.policy);
                    step.newly_skipped = manager.mark_dependents_skipped(&id);
                }
            }
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.policy);
        step.newly_scheduled = manager.collect_new_ready_tasks();
        step.run_just_finished = self.maybe_finish_run();
        step
    }
}
