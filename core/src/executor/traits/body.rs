use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::FlagError;
use crate::flags::{Flag, FlagInjector, Issue};
use crate::task::Task;

/// Failure reported by a task body. Stored on the task record as its error.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct TaskFailure {
    pub message: String,
    /// Retry strategies skip failures marked non-retryable.
    pub retryable: bool,
}

impl TaskFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<anyhow::Error> for TaskFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

impl From<FlagError> for TaskFailure {
    fn from(err: FlagError) -> Self {
        Self::fatal(err.to_string())
    }
}

impl From<String> for TaskFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for TaskFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// What a task body can see about the run it is part of.
#[derive(Clone)]
pub struct TaskContext {
    pub workflow_id: String,
    pub run_id: String,
    pub wave: usize,
    /// 0 for the first attempt.
    pub attempt: u32,
    pub provider: String,
    injector: Arc<FlagInjector>,
}

impl TaskContext {
    pub fn new(
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
        wave: usize,
        provider: impl Into<String>,
        injector: Arc<FlagInjector>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            wave,
            attempt: 0,
            provider: provider.into(),
            injector,
        }
    }

    pub fn injector(&self) -> &FlagInjector {
        &self.injector
    }

    /// Raise a cross-item flag; its fix task joins the next resolution pass.
    pub fn raise_flag(
        &self,
        discovered_in: u32,
        affects_item: u32,
        issue: Issue,
    ) -> Result<Flag, FlagError> {
        self.injector.add_flag(discovered_in, affects_item, issue)
    }
}

/// The unit of work the host plugs into the executor: one task in, one of
/// two outcomes out.
#[async_trait]
pub trait TaskBody: Send + Sync {
    fn name(&self) -> &str {
        "task-body"
    }

    async fn run(&self, task: &Task, ctx: &TaskContext) -> Result<serde_json::Value, TaskFailure>;
}

/// Adapts an async closure into a [`TaskBody`].
pub struct FnTaskBody<F> {
    f: F,
}

impl<F> FnTaskBody<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskBody for FnTaskBody<F>
where
    F: Fn(Task, TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, TaskFailure>> + Send,
{
    fn name(&self) -> &str {
        "fn"
    }

    async fn run(&self, task: &Task, ctx: &TaskContext) -> Result<serde_json::Value, TaskFailure> {
        (self.f)(task.clone(), ctx.clone()).await
    }
}

/// Shorthand for `Arc::new(FnTaskBody::new(f))`.
pub fn task_body_fn<F, Fut>(f: F) -> Arc<dyn TaskBody>
where
    F: Fn(Task, TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, TaskFailure>> + Send + 'static,
{
    Arc::new(FnTaskBody::new(f))
}
