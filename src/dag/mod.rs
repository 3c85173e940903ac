// src/dag/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`graph`] holds the validated task graph (unknown dependencies and
//!   cycles are rejected at construction).
//! - [`scheduler`] contains the per-run state machine that decides which
//!   tasks are ready to run, and which must be skipped after a failure.
//! - [`task_info`] provides task metadata and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.
//! - [`report`] summarises a finished (or interrupted) run.

pub mod graph;
pub mod report;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::{TaskGraph, TaskSpec};
pub use report::RunReport;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTask, TaskRunState};
