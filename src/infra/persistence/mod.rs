//! Snapshot persistence backends.

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::core::{SchedulerError, Snapshot};

pub use file::JsonFileStore;
pub use memory::InMemorySnapshotStore;

/// Durable home for queue snapshots.
///
/// `save` must replace the previous snapshot as a whole: a reader never observes a
/// partially written snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the latest snapshot, `None` if nothing has been saved yet.
    async fn load(&self) -> Result<Option<Snapshot>, SchedulerError>;

    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), SchedulerError>;
}
