//! Scheduler loop: promotes elapsed retries, dispatches eligible tasks up to the concurrency
//! budget, and applies handler outcomes.
//!
//! All task mutations happen under the queue's single state mutex. Handlers run outside it,
//! each in its own spawned future; completions re-enter the mutex to record their outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::executor::{run_handler, TaskHandler};
use super::queue::Inner;
use super::retry::{self, RetryDecision};
use super::{QueueEvent, SchedulerError, Task};

/// Spawner abstraction so the queue does not hard-wire a runtime handle.
///
/// Handler executions use tokio timers and `tokio::spawn`, so spawned futures must end up
/// on a tokio runtime.
pub trait Spawn: Send + Sync + 'static {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Drive ticks until `stop` flips to `true` or its sender is dropped.
///
/// A tick runs on the fixed cadence and whenever something signals `Inner::wake`
/// (task added or finished, backoff elapsed).
pub(crate) async fn run_loop<S: Spawn>(inner: Arc<Inner<S>>, mut stop: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_millis(inner.config.tick_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(
        tick_interval_ms = inner.config.tick_interval_ms,
        "scheduler loop started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            () = inner.wake.notified() => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        if *stop.borrow() {
            break;
        }
        tick(&inner).await;
    }

    tracing::debug!("scheduler loop exited");
}

/// One scheduling pass.
pub(crate) async fn tick<S: Spawn>(inner: &Arc<Inner<S>>) {
    let now = inner.clock.now();
    let mut events = Vec::new();
    let mut dispatch: Vec<(Arc<dyn TaskHandler>, Task)> = Vec::new();
    let mut changed = false;

    {
        let mut guard = inner.state.lock();
        let state = &mut *guard;
        if !state.running {
            return;
        }

        for id in state.store.due_retries(now) {
            if let Some(task) = state.store.get_mut(&id) {
                task.requeue();
                changed = true;
                tracing::debug!(task_id = %id, retries = task.retries, "backoff elapsed, task requeued");
            }
        }

        let in_flight = *inner.in_flight.borrow();
        let free = inner.config.concurrency.saturating_sub(in_flight);
        if free > 0 {
            for id in state.store.eligible_ids() {
                if dispatch.len() >= free {
                    break;
                }
                let Some(task) = state.store.get_mut(&id) else {
                    continue;
                };
                changed = true;

                if let Some(handler) = inner.handlers.get(&task.task_type) {
                    task.start(now);
                    let snapshot = task.clone();
                    tracing::info!(
                        task_id = %snapshot.id,
                        task_type = %snapshot.task_type,
                        priority = ?snapshot.priority,
                        retries = snapshot.retries,
                        "task started"
                    );
                    events.push(QueueEvent::TaskStarted(snapshot.clone()));
                    dispatch.push((handler, snapshot));
                } else {
                    // Configuration error: fail without a retry and without taking a slot.
                    let err = SchedulerError::HandlerNotFound(task.task_type.clone());
                    task.fail(err.to_string(), now);
                    let snapshot = task.clone();
                    tracing::error!(
                        task_id = %snapshot.id,
                        task_type = %snapshot.task_type,
                        "no handler registered, task failed"
                    );
                    state.store.push_dead_letter(snapshot.clone());
                    events.push(QueueEvent::TaskFailed(snapshot));
                }
            }

            if !dispatch.is_empty() {
                let started = dispatch.len();
                inner.in_flight.send_modify(|n| *n += started);
            }
        }

        tracing::debug!(
            in_flight = in_flight,
            dispatched = dispatch.len(),
            "scheduler tick"
        );
    }

    inner.events.emit_all(events);
    for (handler, task) in dispatch {
        inner
            .spawner
            .spawn(execute(Arc::clone(inner), handler, task));
    }
    if changed {
        inner.persist().await;
    }
}

/// Run one attempt and record its outcome.
async fn execute<S: Spawn>(inner: Arc<Inner<S>>, handler: Arc<dyn TaskHandler>, task: Task) {
    let id = task.id.clone();
    let outcome = run_handler(handler, task).await;
    let now = inner.clock.now();
    if let Some(delay) = settle(&inner, &id, outcome, now) {
        wake_after(&inner, delay);
    }

    inner.persist().await;
    // Release the slot last so `stop` observes a fully recorded outcome.
    inner.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    inner.wake.notify_one();
}

/// Apply a finished attempt to the store: complete, schedule a retry, or dead-letter.
///
/// The outcome event is emitted before the state lock is released, so no subscriber sees
/// a dependent start ahead of its prerequisite's completion. Returns the backoff delay
/// when a retry was scheduled.
fn settle<S: Spawn>(
    inner: &Inner<S>,
    id: &str,
    outcome: Result<serde_json::Value, SchedulerError>,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let mut guard = inner.state.lock();
    let state = &mut *guard;
    let Some(task) = state.store.get_mut(id) else {
        tracing::warn!(task_id = %id, "finished task no longer in store");
        return None;
    };

    let err = match outcome {
        Ok(value) => {
            task.complete(value, now);
            tracing::info!(task_id = %id, retries = task.retries, "task completed");
            inner.events.emit(QueueEvent::TaskCompleted(task.clone()));
            return None;
        }
        Err(err) => err,
    };

    let decision = if err.is_retryable() {
        retry::decide(task)
    } else {
        RetryDecision::Exhausted
    };
    match decision {
        RetryDecision::Retry { retries, delay } => {
            let retry_at = chrono::Duration::from_std(delay)
                .ok()
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            task.schedule_retry(err.to_string(), retry_at);
            tracing::warn!(
                task_id = %id,
                retries,
                max_retries = task.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "task attempt failed, retrying"
            );
            inner.events.emit(QueueEvent::TaskRetrying(task.clone()));
            Some(delay)
        }
        RetryDecision::Exhausted => {
            task.fail(err.to_string(), now);
            let snapshot = task.clone();
            tracing::error!(
                task_id = %id,
                retries = snapshot.retries,
                error = %err,
                "task failed permanently"
            );
            state.store.push_dead_letter(snapshot.clone());
            inner.events.emit(QueueEvent::TaskFailed(snapshot));
            None
        }
    }
}

/// Wake the scheduler once `delay` has passed, unless the queue is gone by then.
pub(crate) fn wake_after<S: Spawn>(inner: &Arc<Inner<S>>, delay: Duration) {
    let weak = Arc::downgrade(inner);
    inner.spawner.spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(inner) = weak.upgrade() {
            inner.wake.notify_one();
        }
    });
}
