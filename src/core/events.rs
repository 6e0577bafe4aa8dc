//! Lifecycle events and the broadcast bus that carries them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::audit::{AuditEvent, AuditSink};
use super::Task;
use crate::util::Clock;

/// Lifecycle notification. Task events carry a snapshot of the task after the transition.
///
/// Serialized as `{ "event": "taskCompleted", "task": { ... } }`; queue-level events have no
/// `task` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "task", rename_all = "camelCase")]
pub enum QueueEvent {
    /// Task accepted by `add_task`.
    TaskAdded(Task),
    /// Handler dispatched.
    TaskStarted(Task),
    /// Handler succeeded.
    TaskCompleted(Task),
    /// Task failed permanently and was dead-lettered.
    TaskFailed(Task),
    /// Attempt failed; task waits for its backoff.
    TaskRetrying(Task),
    /// Task cancelled before dispatch.
    TaskCancelled(Task),
    /// Scheduler loop started.
    Started,
    /// Queue drained and stopped.
    Stopped,
}

impl QueueEvent {
    /// Event name as seen by subscribers.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TaskAdded(_) => "taskAdded",
            Self::TaskStarted(_) => "taskStarted",
            Self::TaskCompleted(_) => "taskCompleted",
            Self::TaskFailed(_) => "taskFailed",
            Self::TaskRetrying(_) => "taskRetrying",
            Self::TaskCancelled(_) => "taskCancelled",
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }

    /// Task snapshot carried by the event.
    #[must_use]
    pub const fn task(&self) -> Option<&Task> {
        match self {
            Self::TaskAdded(t)
            | Self::TaskStarted(t)
            | Self::TaskCompleted(t)
            | Self::TaskFailed(t)
            | Self::TaskRetrying(t)
            | Self::TaskCancelled(t) => Some(t),
            Self::Started | Self::Stopped => None,
        }
    }
}

/// Fan-out of queue events to broadcast subscribers and an optional audit sink.
///
/// Sending never blocks; subscribers that fall more than `capacity` events behind observe
/// `RecvError::Lagged` and skip ahead.
pub struct EventBus {
    sender: broadcast::Sender<QueueEvent>,
    audit: Option<Arc<dyn AuditSink>>,
    clock: Arc<dyn Clock>,
}

impl EventBus {
    /// Bus with room for `capacity` undelivered events per subscriber.
    #[must_use]
    pub fn new(capacity: usize, audit: Option<Arc<dyn AuditSink>>, clock: Arc<dyn Clock>) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            audit,
            clock,
        }
    }

    /// New subscriber; sees events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    /// Publish an event.
    pub fn emit(&self, event: QueueEvent) {
        if let Some(audit) = &self.audit {
            audit.record(AuditEvent::from_queue_event(&event, self.clock.now()));
        }
        tracing::trace!(event = event.name(), "queue event");
        // No receivers is not an error for the queue.
        let _ = self.sender.send(event);
    }

    /// Publish several events in order.
    pub fn emit_all(&self, events: impl IntoIterator<Item = QueueEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}
