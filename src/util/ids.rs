//! Identifier types and generation.

/// Caller-visible opaque task identifier.
pub type TaskId = String;

/// Generate a fresh task id (UUID v4).
#[must_use]
pub fn generate_task_id() -> TaskId {
    uuid::Uuid::new_v4().to_string()
}
