//! Tests for audit sinks

use prometheus_task_queue::core::{AuditEvent, AuditSink, InMemoryAuditSink, QueueEvent, TaskConfig, TaskDefaults};

fn sample_task() -> prometheus_task_queue::core::Task {
    TaskConfig::new("audit.test")
        .with_id("task-1")
        .into_task(
            TaskDefaults {
                max_retries: 0,
                retry_delay_ms: 10,
                timeout_ms: 100,
            },
            chrono::Utc::now(),
        )
        .unwrap()
}

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);
    let event = AuditEvent::from_queue_event(&QueueEvent::TaskAdded(sample_task()), chrono::Utc::now());
    sink.record(event);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].task_id.as_deref(), Some("task-1"));
    assert_eq!(events[0].action, "taskAdded");
    assert!(events[0].detail.as_deref().unwrap().contains("status=pending"));
}

#[test]
fn test_audit_sink_max_events() {
    let sink = InMemoryAuditSink::new(3);
    for _ in 0..5 {
        sink.record(AuditEvent::from_queue_event(&QueueEvent::Started, chrono::Utc::now()));
    }
    assert_eq!(sink.events().len(), 3);
}

#[test]
fn test_queue_level_event_has_no_task() {
    let event = AuditEvent::from_queue_event(&QueueEvent::Stopped, chrono::Utc::now());
    assert_eq!(event.action, "stopped");
    assert!(event.task_id.is_none());
    assert!(event.detail.is_none());
    assert!(!event.event_id.is_empty());
}

#[test]
fn test_failed_event_detail_includes_error() {
    let mut task = sample_task();
    task.fail("boom".into(), chrono::Utc::now());
    let event = AuditEvent::from_queue_event(&QueueEvent::TaskFailed(task), chrono::Utc::now());
    assert_eq!(event.detail.as_deref(), Some("status=failed retries=0 error=boom"));
}
