//! Task handlers, the handler registry, and timed handler execution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::{SchedulerError, Task};

/// Business logic for one task type.
///
/// The handler receives a snapshot of the task (payload included) and returns the
/// result to store on success. Any error marks the attempt as failed and goes through
/// the retry policy.
///
/// Handlers may be re-run after a crash: a task interrupted mid-flight is reset to
/// pending on the next `initialize`, so side effects should be idempotent.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_task_queue::core::{Task, TaskHandler};
///
/// struct InvoiceHandler;
///
/// #[async_trait]
/// impl TaskHandler for InvoiceHandler {
///     async fn handle(&self, task: Task) -> anyhow::Result<serde_json::Value> {
///         let amount = task.payload["amount"].as_u64().unwrap_or_default();
///         Ok(serde_json::json!({ "charged": amount }))
///     }
/// }
/// ```
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Run one attempt.
    async fn handle(&self, task: Task) -> anyhow::Result<Value>;
}

/// Adapter turning an async closure into a [`TaskHandler`].
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn handle(&self, task: Task) -> anyhow::Result<Value> {
        (self.f)(task).await
    }
}

/// Wrap an async closure as a handler.
///
/// ```rust,ignore
/// queue.register_handler("echo", handler_fn(|task| async move { Ok(task.payload) }));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    FnHandler { f }
}

/// Registry of handlers keyed by task type. Registering a type again replaces it.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
}

impl HandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `task_type`, returning the handler it replaced.
    pub fn register(
        &self,
        task_type: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.write().insert(task_type.into(), handler)
    }

    /// Handler for `task_type`.
    #[must_use]
    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.read().get(task_type).cloned()
    }

    /// Whether a handler exists for `task_type`.
    #[must_use]
    pub fn contains(&self, task_type: &str) -> bool {
        self.handlers.read().contains_key(task_type)
    }

    /// Registered task types, sorted.
    #[must_use]
    pub fn task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.read().keys().cloned().collect();
        types.sort();
        types
    }
}

/// Run one handler attempt under the task's timeout.
///
/// The handler runs in its own tokio task so a panic is reported as a failed attempt
/// instead of unwinding through the scheduler. On timeout the handler task is aborted.
///
/// # Errors
///
/// - [`SchedulerError::Handler`] with the handler's message (alternate `{:#}` form, so
///   context chains are kept) or `"handler panicked"`
/// - [`SchedulerError::ExecutionTimeout`] when `timeout_ms` elapses first
pub async fn run_handler(handler: Arc<dyn TaskHandler>, task: Task) -> Result<Value, SchedulerError> {
    let timeout_ms = task.timeout_ms;
    let mut join = tokio::spawn(async move { handler.handle(task).await });

    match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut join).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => Err(SchedulerError::Handler(format!("{err:#}"))),
        Ok(Err(join_err)) if join_err.is_panic() => {
            Err(SchedulerError::Handler("handler panicked".into()))
        }
        Ok(Err(join_err)) => Err(SchedulerError::Handler(join_err.to_string())),
        Err(_) => {
            join.abort();
            Err(SchedulerError::ExecutionTimeout(timeout_ms))
        }
    }
}
