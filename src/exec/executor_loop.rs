// src/exec/executor_loop.rs

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::exec::task_runner::run_task;
use crate::tasks::{ActionRegistry, TaskContext};
use crate::types::TaskId;

/// Start the loop that turns scheduled tasks into running actions.
///
/// Every task gets its own tokio task, so everything the scheduler releases
/// together runs concurrently. A task id that arrives a second time is
/// dropped: actions run at most once per process.
pub fn spawn_executor(
    actions: ActionRegistry,
    ctx: Arc<TaskContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> mpsc::Sender<ScheduledTask> {
    let (queue, mut incoming) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        let mut seen: HashSet<TaskId> = HashSet::new();

        while let Some(task) = incoming.recv().await {
            if !seen.insert(task.id.clone()) {
                warn!(task = %task.id, "already started; ignoring");
                continue;
            }
            debug!(task = %task.id, kind = ?task.kind, "starting");

            let action = actions.get(&task.id).cloned();
            tokio::spawn(run_task(task, action, Arc::clone(&ctx), runtime_tx.clone()));
        }

        debug!("executor queue closed");
    });

    queue
}
