//! Infrastructure adapters for snapshot storage.

pub mod persistence;

pub use persistence::{InMemorySnapshotStore, JsonFileStore, SnapshotStore};
