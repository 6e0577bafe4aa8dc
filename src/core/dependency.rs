//! Dependency resolution: a task is ready only when every prerequisite has completed.
//!
//! A dependency id with no matching task is unmet, so a dependent of a missing,
//! failed, or cancelled task stays pending indefinitely. Failures are not propagated.

use std::collections::HashMap;

use super::{Task, TaskStatus};
use crate::util::TaskId;

/// Whether every prerequisite of `task` has reached `Completed`.
#[must_use]
pub fn dependencies_satisfied(task: &Task, tasks: &HashMap<TaskId, Task>) -> bool {
    task.dependencies
        .iter()
        .all(|dep| is_completed(dep, tasks))
}

/// Prerequisites of `task` that have not completed, in declaration order.
#[must_use]
pub fn unmet_dependencies(task: &Task, tasks: &HashMap<TaskId, Task>) -> Vec<TaskId> {
    task.dependencies
        .iter()
        .filter(|dep| !is_completed(dep, tasks))
        .cloned()
        .collect()
}

fn is_completed(id: &str, tasks: &HashMap<TaskId, Task>) -> bool {
    tasks
        .get(id)
        .is_some_and(|t| t.status == TaskStatus::Completed)
}
