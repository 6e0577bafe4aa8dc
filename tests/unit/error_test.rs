//! Tests for error types

use prometheus_task_queue::core::SchedulerError;

#[test]
fn test_handler_not_found_error() {
    let err = SchedulerError::HandlerNotFound("unregistered".to_string());
    assert_eq!(format!("{}", err), "No handler for task type: unregistered");
    assert!(!err.is_retryable());
}

#[test]
fn test_execution_timeout_error() {
    let err = SchedulerError::ExecutionTimeout(250);
    assert_eq!(format!("{}", err), "Task timed out after 250ms");
    assert!(err.is_retryable());
}

#[test]
fn test_handler_error_is_verbatim() {
    let err = SchedulerError::Handler("payment gateway returned 502".to_string());
    assert_eq!(format!("{}", err), "payment gateway returned 502");
    assert!(err.is_retryable());
}

#[test]
fn test_persistence_error() {
    let err = SchedulerError::Persistence("disk full".to_string());
    assert_eq!(format!("{}", err), "persistence error: disk full");
    assert!(!err.is_retryable());
}

#[test]
fn test_lookup_errors() {
    assert_eq!(
        SchedulerError::DuplicateTask("a".into()).to_string(),
        "duplicate task id: a"
    );
    assert_eq!(
        SchedulerError::TaskNotFound("b".into()).to_string(),
        "task not found: b"
    );
    assert_eq!(
        SchedulerError::Timeout("c".into()).to_string(),
        "timed out waiting for task c"
    );
}

#[test]
fn test_app_result_wraps_scheduler_error() {
    fn fails() -> prometheus_task_queue::core::AppResult<()> {
        Err(SchedulerError::InvalidConfig("concurrency must be greater than 0".into()).into())
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
