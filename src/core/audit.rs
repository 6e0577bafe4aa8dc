//! Audit sink implementations.
//!
//! Every lifecycle event the queue emits can also be recorded as an [`AuditEvent`], giving a
//! durable-ish trail that survives broadcast lag.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::QueueEvent;
use crate::util::TaskId;

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related task identifier; `None` for queue-level events.
    pub task_id: Option<TaskId>,
    /// Lifecycle event name (`taskAdded`, `taskFailed`, `stopped`, ...).
    pub action: String,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
    /// Additional context (status and error of the task, when there is one).
    pub detail: Option<String>,
}

impl AuditEvent {
    /// Build the audit record for a queue event.
    #[must_use]
    pub fn from_queue_event(event: &QueueEvent, now: DateTime<Utc>) -> Self {
        let task = event.task();
        let detail = task.map(|t| match &t.error {
            Some(err) => format!("status={} retries={} error={err}", t.status, t.retries),
            None => format!("status={} retries={}", t.status, t.retries),
        });
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            task_id: task.map(|t| t.id.clone()),
            action: event.name().to_string(),
            created_at: now,
            detail,
        }
    }
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev. Clones share the same buffer.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored events for one task, oldest first.
    #[must_use]
    pub fn events_for(&self, task_id: &str) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.task_id.as_deref() == Some(task_id))
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}
