//! Task model, scheduling, execution, and the queue facade.

pub mod audit;
pub mod dependency;
pub mod error;
pub mod events;
pub mod executor;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod task;

pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink};
pub use dependency::{dependencies_satisfied, unmet_dependencies};
pub use error::{AppResult, SchedulerError};
pub use events::{EventBus, QueueEvent};
pub use executor::{handler_fn, run_handler, FnHandler, HandlerRegistry, TaskHandler};
pub use queue::TaskQueue;
pub use retry::{backoff_delay, decide, RetryDecision};
pub use scheduler::Spawn;
pub use store::{QueueStats, Snapshot, TaskStore};
pub use task::{Priority, Task, TaskConfig, TaskDefaults, TaskStatus};
