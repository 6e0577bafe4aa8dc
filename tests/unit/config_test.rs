//! Tests for configuration validation

use prometheus_task_queue::config::QueueConfig;
use prometheus_task_queue::core::SchedulerError;

#[test]
fn test_default_config() {
    let cfg = QueueConfig::default();
    assert_eq!(cfg.concurrency, 5);
    assert_eq!(cfg.max_retries, 3);
    assert_eq!(cfg.retry_delay_ms, 5_000);
    assert_eq!(cfg.timeout_ms, 300_000);
    assert_eq!(cfg.persist_path, None);
    assert!(!cfg.auto_start);
    assert_eq!(cfg.tick_interval_ms, 1_000);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_config_invalid_concurrency() {
    let err = QueueConfig::new().with_concurrency(0).validate().unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}

#[test]
fn test_config_invalid_timeout() {
    assert!(QueueConfig::new().with_timeout_ms(0).validate().is_err());
}

#[test]
fn test_config_invalid_tick_interval() {
    assert!(QueueConfig::new().with_tick_interval_ms(0).validate().is_err());
}

#[test]
fn test_task_defaults_follow_config() {
    let defaults = QueueConfig::new()
        .with_max_retries(7)
        .with_retry_delay_ms(250)
        .with_timeout_ms(900)
        .task_defaults();
    assert_eq!(defaults.max_retries, 7);
    assert_eq!(defaults.retry_delay_ms, 250);
    assert_eq!(defaults.timeout_ms, 900);
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "concurrency": 2,
        "maxRetries": 1,
        "persistPath": "/var/lib/queue/state.json",
        "autoStart": true
    }"#;
    let cfg = QueueConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.concurrency, 2);
    assert_eq!(cfg.max_retries, 1);
    assert!(cfg.auto_start);
    assert_eq!(cfg.timeout_ms, 300_000);
    assert_eq!(
        cfg.persist_path.as_deref(),
        Some(std::path::Path::new("/var/lib/queue/state.json"))
    );
}

#[test]
fn test_config_from_json_invalid() {
    assert!(QueueConfig::from_json_str(r#"{ "concurrency": 0 }"#).is_err());
    assert!(QueueConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_from_lookup() {
    let cfg = QueueConfig::from_lookup(|key| match key {
        "TASK_QUEUE_TIMEOUT_MS" => Some("1500".to_string()),
        "TASK_QUEUE_AUTO_START" => Some("false".to_string()),
        "TASK_QUEUE_PERSIST_PATH" => Some("   ".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(cfg.timeout_ms, 1_500);
    assert!(!cfg.auto_start);
    assert_eq!(cfg.persist_path, None);
}

#[test]
fn test_config_from_lookup_invalid_bool() {
    let err = QueueConfig::from_lookup(|key| {
        (key == "TASK_QUEUE_AUTO_START").then(|| "maybe".to_string())
    })
    .unwrap_err();
    assert!(err.to_string().contains("expected a boolean"));
}
