// src/tasks/group.rs

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;
use crate::tasks::{TaskAction, TaskContext};

/// Only orders its dependencies.
#[derive(Debug, Default)]
pub struct GroupAction;

impl TaskAction for GroupAction {
    fn run<'a>(
        &'a self,
        _ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}
