//! Tests for builders

use std::sync::Arc;

use prometheus_task_queue::builders::TaskQueueBuilder;
use prometheus_task_queue::config::QueueConfig;
use prometheus_task_queue::core::{SchedulerError, TaskConfig, TaskStatus};
use prometheus_task_queue::infra::InMemorySnapshotStore;
use prometheus_task_queue::runtime::TokioSpawner;

#[tokio::test]
async fn test_build_with_defaults() {
    let queue = TaskQueueBuilder::new().build().unwrap();
    assert_eq!(queue.config().concurrency, 5);
    assert!(!queue.is_running());
    assert_eq!(queue.get_stats().total, 0);
}

#[tokio::test]
async fn test_build_rejects_invalid_config() {
    let result = TaskQueueBuilder::new()
        .with_config(QueueConfig::new().with_concurrency(0))
        .build();
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_build_outside_runtime_needs_spawner() {
    let result = TaskQueueBuilder::new().build();
    assert!(matches!(result, Err(SchedulerError::NoRuntime(_))));

    let rt = tokio::runtime::Runtime::new().unwrap();
    let queue = TaskQueueBuilder::new()
        .with_spawner(TokioSpawner::new(rt.handle().clone()))
        .build();
    assert!(queue.is_ok());
}

#[tokio::test]
async fn test_open_restores_and_auto_starts() {
    let store = InMemorySnapshotStore::new();
    let first = TaskQueueBuilder::new()
        .with_snapshot_store(Arc::new(store.clone()))
        .build()
        .unwrap();
    let id = first
        .add_task(TaskConfig::new("never.registered").with_name("seed"))
        .unwrap();
    first.stop().await;

    let second = TaskQueueBuilder::new()
        .with_config(QueueConfig::new().with_auto_start(true).with_tick_interval_ms(10))
        .with_snapshot_store(Arc::new(store))
        .open()
        .await
        .unwrap();
    assert!(second.is_running());
    let task = second
        .await_task(&id, std::time::Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(task.name, "seed");
    assert_eq!(task.status, TaskStatus::Failed);
    second.stop().await;
}

#[tokio::test]
async fn test_persist_path_selects_json_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.json");
    let queue = TaskQueueBuilder::new()
        .with_config(QueueConfig::new().with_persist_path(&path))
        .build()
        .unwrap();
    queue.add_task(TaskConfig::new("noop")).unwrap();
    queue.stop().await;
    assert!(path.exists());
}
