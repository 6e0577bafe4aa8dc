//! Builder that assembles a [`TaskQueue`] from configuration and injected components.

use std::sync::Arc;

use crate::config::QueueConfig;
use crate::core::{AuditSink, SchedulerError, Spawn, TaskQueue};
use crate::infra::{JsonFileStore, SnapshotStore};
use crate::runtime::TokioSpawner;
use crate::util::{Clock, SystemClock};

/// Assembles a [`TaskQueue`].
///
/// Without an explicit snapshot store, a [`JsonFileStore`] is used when the configuration
/// names a `persist_path`; otherwise the queue is memory-only. The default spawner is the
/// tokio runtime current when [`TaskQueueBuilder::new`] runs.
pub struct TaskQueueBuilder<S = TokioSpawner> {
    config: QueueConfig,
    snapshot_store: Option<Arc<dyn SnapshotStore>>,
    clock: Arc<dyn Clock>,
    audit: Option<Arc<dyn AuditSink>>,
    spawner: Result<S, SchedulerError>,
}

impl TaskQueueBuilder<TokioSpawner> {
    /// Builder with default configuration and the current tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: QueueConfig::default(),
            snapshot_store: None,
            clock: Arc::new(SystemClock),
            audit: None,
            spawner: TokioSpawner::current(),
        }
    }
}

impl Default for TaskQueueBuilder<TokioSpawner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Spawn> TaskQueueBuilder<S> {
    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist through `store` instead of the configured path.
    #[must_use]
    pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshot_store = Some(store);
        self
    }

    /// Time source for timestamps and retry deadlines.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Record every lifecycle event in `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Spawn the scheduler loop and executions through `spawner`.
    #[must_use]
    pub fn with_spawner<S2: Spawn>(self, spawner: S2) -> TaskQueueBuilder<S2> {
        TaskQueueBuilder {
            config: self.config,
            snapshot_store: self.snapshot_store,
            clock: self.clock,
            audit: self.audit,
            spawner: Ok(spawner),
        }
    }

    /// Validate and build. The queue starts empty and stopped.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidConfig`] when the configuration is invalid
    /// - [`SchedulerError::NoRuntime`] when no spawner is available
    pub fn build(self) -> Result<TaskQueue<S>, SchedulerError> {
        self.config.validate()?;
        let spawner = self.spawner?;
        let persistence = self.snapshot_store.or_else(|| {
            self.config
                .persist_path
                .clone()
                .map(|path| Arc::new(JsonFileStore::new(path)) as Arc<dyn SnapshotStore>)
        });
        tracing::debug!(
            concurrency = self.config.concurrency,
            persistent = persistence.is_some(),
            "task queue built"
        );
        Ok(TaskQueue::from_parts(
            self.config,
            persistence,
            self.clock,
            self.audit,
            spawner,
        ))
    }

    /// Build, restore the last snapshot, and start when `auto_start` is set.
    ///
    /// # Errors
    ///
    /// Everything [`TaskQueueBuilder::build`] and [`TaskQueue::initialize`] return.
    pub async fn open(self) -> Result<TaskQueue<S>, SchedulerError> {
        let queue = self.build()?;
        queue.initialize().await?;
        if queue.config().auto_start {
            queue.start();
        }
        Ok(queue)
    }
}
