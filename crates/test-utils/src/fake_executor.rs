use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use rebundle::dag::ScheduledTask;
use rebundle::engine::{RuntimeEvent, TaskOutcome};
use rebundle::errors::{Error, Result};
use rebundle::exec::ExecutorBackend;
use rebundle::types::TaskId;
use tokio::sync::mpsc;

/// A fake executor that:
/// - records which tasks were "run", in dispatch order
/// - immediately reports `TaskCompleted` for each scheduled task, failing
///   the ones registered with [`FakeExecutor::failing`].
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<TaskId>>>,
    failing: HashSet<TaskId>,
    fatal: bool,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<TaskId>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: HashSet::new(),
            fatal: false,
        }
    }

    /// Report `task` as failed instead of succeeded.
    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(TaskId::new(task));
        self
    }

    /// Mark every injected failure as fatal.
    pub fn fatal_failures(mut self) -> Self {
        self.fatal = true;
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            for t in tasks {
                executed.lock().unwrap().push(t.id.clone());

                let outcome = if self.failing.contains(&t.id) {
                    TaskOutcome::Failed {
                        message: format!("{} failed", t.id),
                        fatal: self.fatal,
                    }
                } else {
                    TaskOutcome::Success
                };

                tx.send(RuntimeEvent::TaskCompleted {
                    task: t.id.clone(),
                    outcome,
                })
                .await
                .map_err(Error::from)?;
            }
            Ok(())
        })
    }
}
