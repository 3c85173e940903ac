// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{error, info};

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::{RuntimeOptions, TaskOutcome};
use crate::types::TaskId;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Request that the process exits.
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn exit(mut commands: Vec<CoreCommand>) -> Self {
        commands.push(CoreCommand::RequestExit);
        Self {
            commands,
            keep_running: false,
        }
    }
}

/// Seed the run with every task that has no dependencies.
pub fn handle_start(scheduler: &mut Scheduler, options: &RuntimeOptions) -> CoreStep {
    let step = scheduler.start();
    after_scheduler_step(scheduler, options, step)
}

/// Handle a task completion event.
///
/// A fatal failure stops the loop immediately, whatever the mode.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    options: &RuntimeOptions,
    fatal: &mut Option<String>,
    task: TaskId,
    outcome: TaskOutcome,
) -> CoreStep {
    let step = scheduler.handle_completion(task.as_str(), &outcome);

    if let TaskOutcome::Failed {
        message,
        fatal: true,
    } = &outcome
    {
        error!(task = %task, error = %message, "fatal error; stopping");
        *fatal = Some(format!("{task}: {message}"));
        return CoreStep::exit(Vec::new());
    }

    after_scheduler_step(scheduler, options, step)
}

/// Handle a fatal error reported by background work.
pub fn handle_fatal(fatal: &mut Option<String>, message: String) -> CoreStep {
    error!(error = %message, "fatal error; stopping");
    *fatal = Some(message);
    CoreStep::exit(Vec::new())
}

fn after_scheduler_step(
    scheduler: &Scheduler,
    options: &RuntimeOptions,
    step: SchedulerStep,
) -> CoreStep {
    let mut commands = Vec::new();
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }

    if step.run_just_finished {
        let report = scheduler.report();
        if options.mode.is_watch() {
            info!(summary = %report, "initial run finished; watching for changes");
        } else {
            info!(summary = %report, "run finished");
            return CoreStep::exit(commands);
        }
    }

    CoreStep {
        commands,
        keep_running: true,
    }
}
