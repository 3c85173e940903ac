// src/exec/mod.rs

//! Task execution layer.
//!
//! This module runs the action behind each scheduled task and reports back
//! to the orchestration runtime via `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the loop receiving scheduled tasks.
//! - [`task_runner`] runs one task action and reports its outcome.
//! - [`command`] runs shell commands for command-driven actions.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `RealExecutorBackend` the runtime uses in production, which tests can
//!   replace with a fake implementation.

pub mod backend;
pub mod command;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::spawn_executor;
