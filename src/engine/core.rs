// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for
//! reading events from channels and sending `ScheduledTask`s to the executor.
//!
//! The core is unit tested without any Tokio, channels, filesystem, or
//! processes.

use crate::dag::{RunReport, Scheduler};
use crate::engine::event_handlers::{
    CoreStep, handle_fatal, handle_start, handle_task_completion,
};
use crate::engine::{RuntimeEvent, RuntimeOptions};

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    options: RuntimeOptions,
    fatal: Option<String>,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self {
            scheduler,
            options,
            fatal: None,
        }
    }

    /// Whether every task of the run reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Kick off the run.
    pub fn start(&mut self) -> CoreStep {
        handle_start(&mut self.scheduler, &self.options)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskCompleted { task, outcome } => handle_task_completion(
                &mut self.scheduler,
                &self.options,
                &mut self.fatal,
                task,
                outcome,
            ),
            RuntimeEvent::Fatal { message } => handle_fatal(&mut self.fatal, message),
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }

    /// Final report, including the fatal error that stopped the run, if any.
    pub fn into_report(self) -> RunReport {
        let mut report = self.scheduler.report();
        report.fatal = self.fatal;
        report
    }
}
