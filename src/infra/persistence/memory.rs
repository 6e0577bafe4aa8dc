//! In-memory snapshot store for tests and embedding.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::SnapshotStore;
use crate::core::{SchedulerError, Snapshot};

/// Snapshot store held in process memory. Clones share the stored snapshot, so a test can
/// hand one clone to a queue and keep another to inspect or to seed a second queue.
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    slot: Arc<Mutex<Option<Snapshot>>>,
    saves: Arc<Mutex<u64>>,
}

impl InMemorySnapshotStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `snapshot`.
    #[must_use]
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        *store.slot.lock() = Some(snapshot);
        store
    }

    /// Latest saved snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<Snapshot> {
        self.slot.lock().clone()
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        *self.saves.lock()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>, SchedulerError> {
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), SchedulerError> {
        *self.slot.lock() = Some(snapshot.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
