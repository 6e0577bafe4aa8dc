//! The queue facade: task submission, queries, lifecycle control, and crash recovery.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch, Notify};

use super::audit::AuditSink;
use super::events::EventBus;
use super::executor::{HandlerRegistry, TaskHandler};
use super::scheduler::{self, Spawn};
use super::store::{QueueStats, TaskStore};
use super::{QueueEvent, SchedulerError, Task, TaskConfig, TaskStatus};
use crate::config::QueueConfig;
use crate::infra::SnapshotStore;
use crate::runtime::TokioSpawner;
use crate::util::{Clock, TaskId};

/// Mutable queue state, guarded by one mutex.
pub(crate) struct QueueState {
    pub(crate) store: TaskStore,
    /// Dispatch enabled.
    pub(crate) running: bool,
    /// Dropping or signalling this ends the current scheduler loop.
    pub(crate) loop_stop: Option<watch::Sender<bool>>,
}

pub(crate) struct Inner<S> {
    pub(crate) config: QueueConfig,
    pub(crate) state: Mutex<QueueState>,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) events: EventBus,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) spawner: S,
    pub(crate) wake: Notify,
    /// Handler executions not yet recorded.
    pub(crate) in_flight: watch::Sender<usize>,
    persistence: Option<Arc<dyn SnapshotStore>>,
    /// Orders snapshot writes; the snapshot is taken while holding it.
    persist_lock: tokio::sync::Mutex<()>,
}

impl<S: Spawn> Inner<S> {
    /// Write the current state. Failures are logged, never returned.
    pub(crate) async fn persist(&self) {
        let Some(backend) = &self.persistence else {
            return;
        };
        let _ordered = self.persist_lock.lock().await;
        let snapshot = {
            let state = self.state.lock();
            state.store.snapshot(self.clock.now())
        };
        if let Err(err) = backend.save(&snapshot).await {
            tracing::error!(error = %err, "failed to persist queue snapshot");
        }
    }

    /// Persist in the background, for callers that cannot await.
    fn persist_later(self: &Arc<Self>) {
        if self.persistence.is_none() {
            return;
        }
        let inner = Arc::clone(self);
        self.spawner.spawn(async move { inner.persist().await });
    }
}

/// Priority task queue with dependency gating, bounded concurrency, retries with
/// exponential backoff, and a dead-letter list.
///
/// Cloning is cheap; clones share the same queue.
///
/// ```rust,ignore
/// use prometheus_task_queue::builders::TaskQueueBuilder;
/// use prometheus_task_queue::config::QueueConfig;
/// use prometheus_task_queue::core::{handler_fn, Priority, TaskConfig};
///
/// let queue = TaskQueueBuilder::new()
///     .with_config(QueueConfig::new().with_concurrency(2).with_persist_path("queue.json"))
///     .open()
///     .await?;
/// queue.register_handler("email", handler_fn(|task| async move { Ok(task.payload) }));
/// let id = queue.add_task(TaskConfig::new("email").with_priority(Priority::High))?;
/// queue.start();
/// let done = queue.await_task(&id, std::time::Duration::from_secs(30)).await?;
/// queue.stop().await;
/// ```
pub struct TaskQueue<S = TokioSpawner> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for TaskQueue<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Spawn> TaskQueue<S> {
    pub(crate) fn from_parts(
        config: QueueConfig,
        persistence: Option<Arc<dyn SnapshotStore>>,
        clock: Arc<dyn Clock>,
        audit: Option<Arc<dyn AuditSink>>,
        spawner: S,
    ) -> Self {
        let events = EventBus::new(config.event_capacity, audit, Arc::clone(&clock));
        let (in_flight, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(QueueState {
                    store: TaskStore::new(),
                    running: false,
                    loop_stop: None,
                }),
                handlers: HandlerRegistry::new(),
                events,
                clock,
                spawner,
                wake: Notify::new(),
                in_flight,
                persistence,
                persist_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Configuration the queue was built with.
    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Register the handler for `task_type`, replacing any previous one.
    pub fn register_handler<H: TaskHandler>(&self, task_type: impl Into<String>, handler: H) {
        let task_type = task_type.into();
        let replaced = self
            .inner
            .handlers
            .register(task_type.clone(), Arc::new(handler))
            .is_some();
        tracing::debug!(task_type = %task_type, replaced, "handler registered");
    }

    /// Registered task types, sorted.
    #[must_use]
    pub fn handler_types(&self) -> Vec<String> {
        self.inner.handlers.task_types()
    }

    /// Enqueue a task. Returns its id without waiting for execution.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidTask`] when the configuration is malformed
    /// - [`SchedulerError::DuplicateTask`] when the id is already in use
    pub fn add_task(&self, config: TaskConfig) -> Result<TaskId, SchedulerError> {
        let task = config.into_task(self.inner.config.task_defaults(), self.inner.clock.now())?;
        let snapshot = task.clone();
        self.inner.state.lock().store.insert(task)?;

        tracing::info!(
            task_id = %snapshot.id,
            task_type = %snapshot.task_type,
            priority = ?snapshot.priority,
            dependencies = snapshot.dependencies.len(),
            "task added"
        );
        let id = snapshot.id.clone();
        self.inner.persist_later();
        self.inner.events.emit(QueueEvent::TaskAdded(snapshot));
        self.inner.wake.notify_one();
        Ok(id)
    }

    /// Cancel a `Pending` or `Retrying` task. Returns `false` for unknown, running, or
    /// already finished tasks.
    pub fn cancel_task(&self, id: &str) -> bool {
        let now = self.inner.clock.now();
        let cancelled = {
            let mut state = self.inner.state.lock();
            state
                .store
                .get_mut(id)
                .and_then(|task| task.cancel(now).then(|| task.clone()))
        };
        let Some(task) = cancelled else {
            tracing::debug!(task_id = %id, "cancel rejected");
            return false;
        };
        tracing::info!(task_id = %id, "task cancelled");
        self.inner.persist_later();
        self.inner.events.emit(QueueEvent::TaskCancelled(task));
        self.inner.wake.notify_one();
        true
    }

    /// Task by id.
    #[must_use]
    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.inner.state.lock().store.get(id).cloned()
    }

    /// All live tasks in creation order.
    #[must_use]
    pub fn get_all_tasks(&self) -> Vec<Task> {
        self.inner.state.lock().store.all()
    }

    /// Live tasks with `status`, in creation order.
    #[must_use]
    pub fn get_tasks_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.inner.state.lock().store.by_status(status)
    }

    /// Permanently failed tasks, in failure order.
    #[must_use]
    pub fn get_dead_letter_queue(&self) -> Vec<Task> {
        self.inner.state.lock().store.dead_letters()
    }

    /// Counts by status.
    #[must_use]
    pub fn get_stats(&self) -> QueueStats {
        self.inner.state.lock().store.stats()
    }

    /// Prerequisites of `id` that have not completed; `None` for an unknown id.
    ///
    /// A dependent of a failed or cancelled task stays pending; this shows what it is
    /// waiting on.
    #[must_use]
    pub fn blocked_on(&self, id: &str) -> Option<Vec<TaskId>> {
        self.inner.state.lock().store.unmet_dependencies(id)
    }

    /// Remove every `Completed` task. Returns how many were removed.
    pub fn clear_completed(&self) -> usize {
        let removed = self.inner.state.lock().store.clear_completed();
        if removed > 0 {
            tracing::info!(removed, "completed tasks cleared");
            self.inner.persist_later();
        }
        removed
    }

    /// Whether the scheduler is dispatching.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Start the scheduler loop. No-op when already running.
    ///
    /// Backoffs restored from a snapshot get a wake-up at the earliest deadline, so they
    /// do not wait for the next periodic tick.
    pub fn start(&self) {
        let (stop_rx, next_retry_at) = {
            let mut state = self.inner.state.lock();
            if state.running {
                return;
            }
            state.running = true;
            let (tx, rx) = watch::channel(false);
            state.loop_stop = Some(tx);
            (rx, state.store.next_retry_at())
        };
        tracing::info!(concurrency = self.inner.config.concurrency, "queue started");
        self.inner.events.emit(QueueEvent::Started);
        self.inner
            .spawner
            .spawn(scheduler::run_loop(Arc::clone(&self.inner), stop_rx));

        if let Some(at) = next_retry_at {
            let delay = (at - self.inner.clock.now()).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "arming wake-up for pending backoff"
            );
            scheduler::wake_after(&self.inner, delay);
        }
    }

    /// Stop dispatching, wait for running handlers to finish and be recorded, then persist.
    ///
    /// Running handlers are never interrupted. Calling `stop` on a stopped queue only
    /// waits for stragglers and persists.
    pub async fn stop(&self) {
        let (was_running, loop_stop) = {
            let mut state = self.inner.state.lock();
            let was_running = std::mem::replace(&mut state.running, false);
            (was_running, state.loop_stop.take())
        };
        if let Some(tx) = loop_stop {
            let _ = tx.send(true);
        }

        let mut in_flight = self.inner.in_flight.subscribe();
        let _ = in_flight.wait_for(|n| *n == 0).await;
        self.inner.persist().await;

        if was_running {
            tracing::info!("queue stopped");
            self.inner.events.emit(QueueEvent::Stopped);
        }
    }

    /// Load the last snapshot and merge it into the live store.
    ///
    /// Tasks that were `Running` when the snapshot was taken are reset to `Pending`, so
    /// their handlers run again. `Retrying` tasks without a recorded deadline become due
    /// immediately. Live tasks win over snapshot tasks with the same id. Without a
    /// snapshot store this does nothing.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Persistence`] when the snapshot cannot be read or parsed.
    pub async fn initialize(&self) -> Result<(), SchedulerError> {
        let Some(backend) = self.inner.persistence.clone() else {
            tracing::debug!("no snapshot store configured");
            return Ok(());
        };
        let Some(snapshot) = backend.load().await? else {
            tracing::info!("no snapshot found, starting empty");
            return Ok(());
        };

        let now = self.inner.clock.now();
        let mut loaded = TaskStore::from_snapshot(snapshot);
        let recovered = loaded.recover_interrupted();
        let rearmed = loaded.rearm_retries(now);
        let restored = self
            .inner
            .state
            .lock()
            .store
            .merge_snapshot(loaded.snapshot(now));

        for id in &recovered {
            tracing::warn!(task_id = %id, "interrupted task reset to pending");
        }
        tracing::info!(
            restored,
            recovered = recovered.len(),
            rearmed,
            "queue state restored"
        );

        self.inner.persist().await;
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Subscribe to lifecycle events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until `id` is `Completed`, `Failed` or `Cancelled` and return it.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::TaskNotFound`] for an unknown id
    /// - [`SchedulerError::Timeout`] when `timeout` elapses first
    pub async fn await_task(&self, id: &str, timeout: Duration) -> Result<Task, SchedulerError> {
        // Subscribe before checking so a transition in between is not missed.
        let mut rx = self.subscribe();
        match self.get_task(id) {
            None => return Err(SchedulerError::TaskNotFound(id.to_string())),
            Some(task) if task.status.is_terminal() => return Ok(task),
            Some(_) => {}
        }

        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Some(task) = event.task() {
                            if task.id == id && task.status.is_terminal() {
                                return Ok(task.clone());
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(task_id = %id, skipped, "event subscriber lagged");
                        if let Some(task) = self.get_task(id).filter(|t| t.status.is_terminal()) {
                            return Ok(task);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(SchedulerError::TaskNotFound(id.to_string()));
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SchedulerError::Timeout(id.to_string()))?
    }
}
