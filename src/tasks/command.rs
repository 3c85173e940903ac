// src/tasks/command.rs

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;
use crate::exec::command::run_shell;
use crate::tasks::{TaskAction, TaskContext};
use crate::types::TaskId;

/// Runs a shell command in the project root (lint steps and the like).
#[derive(Debug)]
pub struct CommandAction {
    id: TaskId,
    cmd: String,
}

impl CommandAction {
    pub fn new(id: TaskId, cmd: String) -> Self {
        Self { id, cmd }
    }
}

impl TaskAction for CommandAction {
    fn run<'a>(
        &'a self,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
        Box::pin(async move {
            run_shell(self.id.as_str(), &self.cmd, &ctx.root).await?;
            Ok(Vec::new())
        })
    }
}
