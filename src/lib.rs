//! # Prometheus Task Queue
//!
//! A priority task queue with dependency gating, bounded concurrency, retries with
//! exponential backoff, a dead-letter list, and crash-safe snapshots.
//!
//! Callers register an async handler per task type, enqueue tasks, and start the queue.
//! A single scheduler loop picks eligible tasks (every dependency completed) by priority
//! and creation order, up to the concurrency bound, and runs their handlers under a
//! per-task timeout. Failed attempts are retried after `retry_delay_ms * 2^(retries-1)`;
//! tasks that exhaust their budget, or have no handler, land in the dead-letter queue.
//!
//! ## Key Features
//!
//! - **Priorities**: `Critical`, `High`, `Medium`, `Low`; no aging, so a steady stream of
//!   critical work starves lower classes
//! - **Dependencies**: a task waits until every prerequisite is `Completed`
//! - **Bounded concurrency**: at most `concurrency` handlers in flight
//! - **Retries**: exponential backoff, deadlines survive restarts
//! - **Persistence**: full JSON snapshot after every mutation, atomic file replacement,
//!   interrupted tasks reset to pending on `initialize`
//! - **Events**: typed broadcast of lifecycle events plus an optional audit trail
//!
//! ```rust,ignore
//! use prometheus_task_queue::builders::TaskQueueBuilder;
//! use prometheus_task_queue::config::QueueConfig;
//! use prometheus_task_queue::core::{handler_fn, Priority, TaskConfig, TaskStatus};
//! use std::time::Duration;
//!
//! let queue = TaskQueueBuilder::new()
//!     .with_config(QueueConfig::from_env()?)
//!     .open()
//!     .await?;
//!
//! queue.register_handler("thumbnail", handler_fn(|task| async move {
//!     // render task.payload ...
//!     Ok(serde_json::json!({ "ok": true }))
//! }));
//!
//! let resize = queue.add_task(TaskConfig::new("thumbnail").with_priority(Priority::High))?;
//! let publish = queue.add_task(TaskConfig::new("thumbnail").depends_on(resize.clone()))?;
//! queue.start();
//!
//! let done = queue.await_task(&publish, Duration::from_secs(60)).await?;
//! assert_eq!(done.status, TaskStatus::Completed);
//! queue.stop().await;
//! ```
//!
//! Handlers may run more than once for the same task after a crash, so they should be
//! idempotent.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Task model, scheduling, execution, and the queue facade.
pub mod core;
/// Configuration models for the queue.
pub mod config;
/// Builders to construct queues from configuration.
pub mod builders;
/// Infrastructure adapters for snapshot storage.
pub mod infra;
/// Runtime adapters for spawning work.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::builders::TaskQueueBuilder;
pub use crate::config::QueueConfig;
pub use crate::core::{
    handler_fn, Priority, QueueEvent, QueueStats, SchedulerError, Task, TaskConfig, TaskHandler,
    TaskQueue, TaskStatus,
};
