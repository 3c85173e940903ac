// src/exec/task_runner.rs

//! Individual task runner.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::RebundleError;
use crate::tasks::{TaskAction, TaskContext};
use crate::types::TaskKind;

/// Run one task's action and emit exactly one `TaskCompleted` event.
///
/// Continuous actions return as soon as their background work is running,
/// so their completion releases dependents without waiting for the
/// background work to end.
pub async fn run_task(
    task: ScheduledTask,
    action: Option<Arc<dyn TaskAction>>,
    ctx: Arc<TaskContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let started = Instant::now();

    let result = match action {
        Some(action) => action.run(&ctx).await.map(|written| {
            if !written.is_empty() {
                debug!(task = %task.id, files = written.len(), "wrote outputs");
            }
        }),
        None => Err(RebundleError::ConfigError(format!(
            "no action registered for task '{}'",
            task.id
        ))),
    };

    match &result {
        Ok(()) if task.kind == TaskKind::Continuous => {
            info!(task = %task.id, "background work started");
        }
        Ok(()) => {
            info!(task = %task.id, elapsed = ?started.elapsed(), "finished task");
        }
        Err(err) => {
            error!(task = %task.id, elapsed = ?started.elapsed(), error = %err, "task failed");
        }
    }

    let outcome = TaskOutcome::from_result(&result);
    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.id.clone(),
            outcome,
        })
        .await
        .is_err()
    {
        // The runtime already stopped (shutdown or fatal error).
        info!(task = %task.id, "runtime gone; dropping completion");
    }
}
