//! Tests for runtime adapters

use prometheus_task_queue::core::Spawn;
use prometheus_task_queue::runtime::TokioSpawner;

#[test]
fn test_spawner_from_explicit_runtime() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let spawner = TokioSpawner::new(rt.handle().clone());
    let (tx, rx) = std::sync::mpsc::channel();
    spawner.spawn(async move {
        tx.send(42).unwrap();
    });
    assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap(), 42);
}

#[test]
fn test_current_requires_runtime() {
    assert!(TokioSpawner::current().is_err());
}

#[tokio::test]
async fn test_current_spawner_targets_calling_runtime() {
    let spawner = TokioSpawner::current().unwrap();
    assert_eq!(
        spawner.handle().runtime_flavor(),
        tokio::runtime::RuntimeFlavor::CurrentThread
    );

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.handle().spawn(async move {
        let _ = tx.send("ran");
    });
    assert_eq!(rx.await.unwrap(), "ran");
}
