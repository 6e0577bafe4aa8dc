//! In-memory task table plus the dead-letter list, and the snapshot format they persist to.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dependency::{dependencies_satisfied, unmet_dependencies};
use super::{SchedulerError, Task, TaskStatus};
use crate::util::TaskId;

/// Full serialization of the store, used for crash recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Live tasks in creation order.
    pub tasks: Vec<Task>,
    /// Tasks that failed permanently, in failure order.
    #[serde(default)]
    pub dead_letter_queue: Vec<Task>,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

/// Task counts grouped by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Waiting for dispatch.
    pub pending: usize,
    /// Handler in flight.
    pub running: usize,
    /// Finished successfully.
    pub completed: usize,
    /// Failed permanently.
    pub failed: usize,
    /// Waiting out a backoff.
    pub retrying: usize,
    /// Cancelled before dispatch.
    pub cancelled: usize,
    /// All tasks in the live store.
    pub total: usize,
}

impl QueueStats {
    /// Count for one status.
    #[must_use]
    pub const fn count(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Running => self.running,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
            TaskStatus::Retrying => self.retrying,
            TaskStatus::Cancelled => self.cancelled,
        }
    }

    fn bump(&mut self, status: TaskStatus) {
        let slot = match status {
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::Running => &mut self.running,
            TaskStatus::Completed => &mut self.completed,
            TaskStatus::Failed => &mut self.failed,
            TaskStatus::Retrying => &mut self.retrying,
            TaskStatus::Cancelled => &mut self.cancelled,
        };
        *slot += 1;
        self.total += 1;
    }
}

/// Task table keyed by id, remembering insertion order for tie-breaking and listing.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: HashMap<TaskId, Task>,
    order: Vec<TaskId>,
    dead_letters: Vec<Task>,
}

impl TaskStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new task.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::DuplicateTask`] when the id is already present.
    pub fn insert(&mut self, task: Task) -> Result<(), SchedulerError> {
        if self.tasks.contains_key(&task.id) {
            return Err(SchedulerError::DuplicateTask(task.id));
        }
        self.order.push(task.id.clone());
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Look up a task.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Look up a task for mutation.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    /// Whether a task with this id is live.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// No live tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterate live tasks in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    /// Clone of every live task, in creation order.
    #[must_use]
    pub fn all(&self) -> Vec<Task> {
        self.iter().cloned().collect()
    }

    /// Clone of every live task with `status`, in creation order.
    #[must_use]
    pub fn by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.iter().filter(|t| t.status == status).cloned().collect()
    }

    /// Clone of the dead-letter list.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<Task> {
        self.dead_letters.clone()
    }

    /// Append a snapshot of a permanently failed task.
    pub fn push_dead_letter(&mut self, task: Task) {
        self.dead_letters.push(task);
    }

    /// Remove every `Completed` task. Returns how many were removed.
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, t| t.status != TaskStatus::Completed);
        let tasks = &self.tasks;
        self.order.retain(|id| tasks.contains_key(id));
        before - self.tasks.len()
    }

    /// Counts by status. `total` always equals the sum of the other fields.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for task in self.tasks.values() {
            stats.bump(task.status);
        }
        stats
    }

    /// Ids of `Pending` tasks whose prerequisites are all `Completed`, ordered by
    /// priority and then creation order.
    #[must_use]
    pub fn eligible_ids(&self) -> Vec<TaskId> {
        let mut eligible: Vec<&Task> = self
            .iter()
            .filter(|t| t.status == TaskStatus::Pending && dependencies_satisfied(t, &self.tasks))
            .collect();
        // Stable: equal priorities keep creation order.
        eligible.sort_by_key(|t| t.priority);
        eligible.into_iter().map(|t| t.id.clone()).collect()
    }

    /// Prerequisites of `id` that have not completed; `None` when the task is unknown.
    #[must_use]
    pub fn unmet_dependencies(&self, id: &str) -> Option<Vec<TaskId>> {
        self.tasks.get(id).map(|t| unmet_dependencies(t, &self.tasks))
    }

    /// Ids of `Retrying` tasks whose backoff has elapsed at `now`.
    #[must_use]
    pub fn due_retries(&self, now: DateTime<Utc>) -> Vec<TaskId> {
        self.iter()
            .filter(|t| {
                t.status == TaskStatus::Retrying && t.next_retry_at.is_none_or(|at| at <= now)
            })
            .map(|t| t.id.clone())
            .collect()
    }

    /// Earliest pending backoff deadline, if any.
    #[must_use]
    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Retrying)
            .filter_map(|t| t.next_retry_at)
            .min()
    }

    /// Reset every `Running` task to `Pending`. Returns the ids that changed.
    pub fn recover_interrupted(&mut self) -> Vec<TaskId> {
        let mut recovered = Vec::new();
        for id in &self.order {
            if let Some(task) = self.tasks.get_mut(id) {
                if task.recover() {
                    recovered.push(id.clone());
                }
            }
        }
        recovered
    }

    /// Give every `Retrying` task without a deadline one at `now`. Returns how many changed.
    pub fn rearm_retries(&mut self, now: DateTime<Utc>) -> usize {
        let mut rearmed = 0;
        for task in self.tasks.values_mut() {
            if task.status == TaskStatus::Retrying && task.next_retry_at.is_none() {
                task.next_retry_at = Some(now);
                rearmed += 1;
            }
        }
        rearmed
    }

    /// Capture the full store.
    #[must_use]
    pub fn snapshot(&self, timestamp: DateTime<Utc>) -> Snapshot {
        Snapshot {
            tasks: self.all(),
            dead_letter_queue: self.dead_letters.clone(),
            timestamp,
        }
    }

    /// Rebuild a store from a snapshot. Duplicate ids keep their first occurrence.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut store = Self::new();
        store.merge_snapshot(snapshot);
        store
    }

    /// Merge a loaded snapshot. Tasks whose id is already live are skipped.
    /// Returns how many tasks were added.
    pub fn merge_snapshot(&mut self, snapshot: Snapshot) -> usize {
        let mut added = 0;
        for task in snapshot.tasks {
            if self.insert(task).is_ok() {
                added += 1;
            }
        }
        for dead in snapshot.dead_letter_queue {
            if !self.dead_letters.iter().any(|d| d.id == dead.id) {
                self.dead_letters.push(dead);
            }
        }
        added
    }
}
