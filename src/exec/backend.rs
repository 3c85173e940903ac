// src/exec/backend.rs

//! Where scheduled tasks go.
//!
//! The runtime only needs something that accepts ready tasks and later
//! answers each one with a `RuntimeEvent::TaskCompleted`. Production uses
//! [`RealExecutorBackend`], which runs the task actions; the runtime tests
//! substitute a backend that answers immediately.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::{Error, Result};
use crate::tasks::{ActionRegistry, TaskContext};

use super::executor_loop::spawn_executor;

pub trait ExecutorBackend: Send {
    /// Hand `tasks` over for execution.
    ///
    /// Each task must be answered by exactly one `TaskCompleted` event.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Runs task actions from `actions` on the executor loop.
#[derive(Debug)]
pub struct RealExecutorBackend {
    queue: mpsc::Sender<ScheduledTask>,
}

impl RealExecutorBackend {
    /// Starts the executor loop right away; completions are reported on
    /// `runtime_tx`.
    pub fn new(
        actions: ActionRegistry,
        ctx: Arc<TaskContext>,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            queue: spawn_executor(actions, ctx, runtime_tx),
        }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let queue = self.queue.clone();
        Box::pin(async move {
            for task in tasks {
                queue.send(task).await.map_err(Error::from)?;
            }
            Ok(())
        })
    }
}
