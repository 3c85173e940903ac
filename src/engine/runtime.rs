// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::RunReport;
use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, RuntimeEvent};

/// Async side of the engine.
///
/// Owns the event receiver and the executor; every decision is delegated to
/// [`CoreRuntime`], this type only carries commands out.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    events: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, events: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            events,
            executor,
        }
    }

    /// Start the run and process events until the core stops or every
    /// sender is gone. Returns the report of the run.
    pub async fn run(mut self) -> Result<RunReport> {
        let run_target = self.core.scheduler().target().clone();
        info!(%run_target, "engine started");

        let start = self.core.start();
        let mut running = self.apply(start).await?;

        while running {
            let Some(event) = self.events.recv().await else {
                info!("all event senders dropped; stopping");
                break;
            };
            debug!(?event, "event");
            let step = self.core.step(event);
            running = self.apply(step).await?;
        }

        info!(%run_target, "engine stopped");
        Ok(self.core.into_report())
    }

    /// Carry out a step's commands; returns whether to keep going.
    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            match command {
                CoreCommand::DispatchTasks(tasks) if tasks.is_empty() => {}
                CoreCommand::DispatchTasks(tasks) => {
                    let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
                    debug!(?ids, "dispatching");
                    self.executor.spawn_ready_tasks(tasks).await?;
                }
                CoreCommand::RequestExit => debug!("exit requested"),
            }
        }
        Ok(step.keep_running)
    }
}
