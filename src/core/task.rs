//! Task records, priorities, and the task state machine.
//!
//! State transitions:
//! - `Pending -> Running -> Completed`
//! - `Pending -> Running -> Retrying -> Pending` (while `retries < max_retries`)
//! - `Pending -> Running -> Failed` (retries exhausted, or no handler for the type)
//! - `Pending | Retrying -> Cancelled` (explicit request only)
//!
//! `Completed`, `Failed` and `Cancelled` are terminal. A running task cannot be cancelled.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::SchedulerError;
use crate::util::{generate_task_id, TaskId};

/// Dispatch class. Lower ordinal is dispatched first.
///
/// Serialized as its ordinal (`0..=3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Priority {
    /// Ordinal 0.
    Critical,
    /// Ordinal 1.
    High,
    /// Ordinal 2.
    #[default]
    Medium,
    /// Ordinal 3.
    Low,
}

impl Priority {
    /// Numeric ordinal of this priority.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.ordinal()
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Critical),
            1 => Ok(Self::High),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Low),
            other => Err(format!("priority must be 0..=3, got {other}")),
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for dispatch.
    Pending,
    /// Handler in flight.
    Running,
    /// Handler succeeded.
    Completed,
    /// Retries exhausted or no handler.
    Failed,
    /// Waiting out a backoff delay before returning to `Pending`.
    Retrying,
    /// Cancelled before dispatch.
    Cancelled,
}

impl TaskStatus {
    /// All statuses, in reporting order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Retrying,
        Self::Cancelled,
    ];

    /// No further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Can be moved to `Cancelled` by an external request.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Retrying)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// The unit of schedulable work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique id.
    pub id: TaskId,
    /// Human-readable label, not unique.
    pub name: String,
    /// Handler lookup key.
    #[serde(rename = "type")]
    pub task_type: String,
    /// Dispatch class.
    #[serde(default)]
    pub priority: Priority,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Ids that must be `Completed` before this task is eligible.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Opaque handler input.
    #[serde(default)]
    pub payload: Value,
    /// Attempts already retried.
    #[serde(default)]
    pub retries: u32,
    /// Retry budget.
    pub max_retries: u32,
    /// Base backoff delay.
    pub retry_delay_ms: u64,
    /// Per-attempt handler timeout.
    pub timeout_ms: u64,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Start of the most recent attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Error of the most recent failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Result of the successful attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// When a `Retrying` task becomes `Pending` again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Free-form annotations.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Task {
    /// `Pending -> Running`.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Running;
        self.started_at = Some(now);
    }

    /// `Running -> Completed`.
    pub fn complete(&mut self, result: Value, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(now);
    }

    /// `Running -> Retrying`; bumps `retries` and records when to requeue.
    pub fn schedule_retry(&mut self, error: String, retry_at: DateTime<Utc>) {
        self.retries += 1;
        self.status = TaskStatus::Retrying;
        self.error = Some(error);
        self.next_retry_at = Some(retry_at);
    }

    /// `Running -> Failed` (or `Pending -> Failed` when no handler exists).
    pub fn fail(&mut self, error: String, now: DateTime<Utc>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.next_retry_at = None;
        self.completed_at = Some(now);
    }

    /// `Retrying -> Pending`.
    pub fn requeue(&mut self) {
        self.status = TaskStatus::Pending;
        self.next_retry_at = None;
    }

    /// `Pending | Retrying -> Cancelled`. Returns false and leaves the task untouched otherwise.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.is_cancellable() {
            return false;
        }
        self.status = TaskStatus::Cancelled;
        self.next_retry_at = None;
        self.completed_at = Some(now);
        true
    }

    /// Reset an interrupted `Running` task to `Pending`. Returns whether it changed.
    pub fn recover(&mut self) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.status = TaskStatus::Pending;
        true
    }
}

/// Partial task description accepted by `TaskQueue::add_task`.
///
/// Unset fields take queue defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskConfig {
    /// Explicit id; generated when absent.
    pub id: Option<TaskId>,
    /// Label; defaults to the task type.
    pub name: Option<String>,
    /// Handler lookup key.
    #[serde(rename = "type")]
    pub task_type: String,
    /// Defaults to `Medium`.
    pub priority: Option<Priority>,
    /// Prerequisite task ids.
    pub dependencies: Vec<TaskId>,
    /// Opaque handler input.
    pub payload: Value,
    /// Overrides the queue's retry budget.
    pub max_retries: Option<u32>,
    /// Overrides the queue's base backoff.
    pub retry_delay_ms: Option<u64>,
    /// Overrides the queue's handler timeout.
    pub timeout_ms: Option<u64>,
    /// Free-form annotations.
    pub metadata: Map<String, Value>,
}

/// Queue-level defaults applied to a [`TaskConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskDefaults {
    /// Retry budget.
    pub max_retries: u32,
    /// Base backoff delay.
    pub retry_delay_ms: u64,
    /// Handler timeout.
    pub timeout_ms: u64,
}

impl TaskConfig {
    /// Describe a task of the given type.
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            ..Self::default()
        }
    }

    /// Set an explicit id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Add a prerequisite task id.
    #[must_use]
    pub fn depends_on(mut self, id: impl Into<TaskId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Replace the prerequisite list.
    #[must_use]
    pub fn with_dependencies<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.dependencies = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the handler payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Override the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Override the base backoff delay.
    #[must_use]
    pub const fn with_retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = Some(retry_delay_ms);
        self
    }

    /// Override the handler timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Validate and materialize a pending [`Task`].
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTask`] for an empty type or id, a zero timeout, or a
    /// task that depends on itself.
    pub fn into_task(self, defaults: TaskDefaults, now: DateTime<Utc>) -> Result<Task, SchedulerError> {
        if self.task_type.trim().is_empty() {
            return Err(SchedulerError::InvalidTask("task type must not be empty".into()));
        }
        let id = match self.id {
            Some(id) if id.trim().is_empty() => {
                return Err(SchedulerError::InvalidTask("task id must not be empty".into()));
            }
            Some(id) => id,
            None => generate_task_id(),
        };
        let timeout_ms = self.timeout_ms.unwrap_or(defaults.timeout_ms);
        if timeout_ms == 0 {
            return Err(SchedulerError::InvalidTask("timeout_ms must be greater than 0".into()));
        }

        let mut dependencies: Vec<TaskId> = Vec::with_capacity(self.dependencies.len());
        for dep in self.dependencies {
            if dep == id {
                return Err(SchedulerError::InvalidTask(format!("task {id} depends on itself")));
            }
            if !dependencies.contains(&dep) {
                dependencies.push(dep);
            }
        }

        Ok(Task {
            name: self.name.unwrap_or_else(|| self.task_type.clone()),
            id,
            task_type: self.task_type,
            priority: self.priority.unwrap_or_default(),
            status: TaskStatus::Pending,
            dependencies,
            payload: self.payload,
            retries: 0,
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
            timeout_ms,
            created_at: now,
            started_at: None,
            completed_at: None,
            error: None,
            result: None,
            next_retry_at: None,
            metadata: self.metadata,
        })
    }
}
