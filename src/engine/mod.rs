// src/engine/mod.rs

//! Drives one invocation: a scheduler run plus whatever keeps the process
//! alive afterwards.
//!
//! [`core`] is a synchronous state machine fed with [`CoreCommand`]s
//! (task finished, shutdown asked, watch rebuild hit a fatal error) that
//! answers with [`CoreStep`]s. [`runtime`] owns the channels and the
//! executor and applies those steps.

use crate::errors::RebundleError;
use crate::types::{RunMode, TaskId};

/// Outcome of a task action for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed {
        message: String,
        /// The failure must stop the process regardless of run mode.
        fatal: bool,
    },
}

impl TaskOutcome {
    pub fn from_result(result: &Result<(), RebundleError>) -> Self {
        match result {
            Ok(()) => TaskOutcome::Success,
            Err(err) => TaskOutcome::Failed {
                message: err.to_string(),
                fatal: err.is_fatal(),
            },
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, TaskOutcome::Failed { fatal: true, .. })
    }
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// `Once` exits when the run finishes; `Watch` keeps running until
    /// shutdown or a fatal error.
    pub mode: RunMode,
}

/// Events flowing into the runtime from the executor, watchers, etc.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task action finished with a concrete outcome.
    TaskCompleted { task: TaskId, outcome: TaskOutcome },
    /// Background work hit an error that must stop the process.
    Fatal { message: String },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
