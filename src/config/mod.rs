//! Configuration models for the queue and its scheduler.

pub mod queue;

pub use queue::{QueueConfig, ENV_PREFIX};
