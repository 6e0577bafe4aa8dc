//! Error types for queue and scheduler operations.

use thiserror::Error;

use crate::util::TaskId;

/// Errors produced by scheduler components.
///
/// The `Display` output of [`HandlerNotFound`](Self::HandlerNotFound),
/// [`ExecutionTimeout`](Self::ExecutionTimeout) and [`Handler`](Self::Handler) is what
/// gets recorded in `Task::error`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No handler registered for the task's type. Never retried.
    #[error("No handler for task type: {0}")]
    HandlerNotFound(String),
    /// Handler did not settle within the task timeout.
    #[error("Task timed out after {0}ms")]
    ExecutionTimeout(u64),
    /// Handler returned an error; message kept verbatim.
    #[error("{0}")]
    Handler(String),
    /// Snapshot could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Task configuration failed validation.
    #[error("invalid task: {0}")]
    InvalidTask(String),
    /// A task with this id already exists.
    #[error("duplicate task id: {0}")]
    DuplicateTask(TaskId),
    /// No task with this id.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// Waiting on a task outcome timed out.
    #[error("timed out waiting for task {0}")]
    Timeout(TaskId),
    /// Operation requires a tokio runtime and none is active.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

impl SchedulerError {
    /// Whether this failure is eligible for the retry policy.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ExecutionTimeout(_) | Self::Handler(_))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
