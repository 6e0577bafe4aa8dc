//! Runtime adapters for spawning the scheduler loop and handler executions.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
