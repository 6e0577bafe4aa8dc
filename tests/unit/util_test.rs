//! Tests for utility functions

use chrono::{TimeZone, Utc};
use prometheus_task_queue::util::{
    generate_task_id, init_tracing, Clock, ManualClock, SystemClock, DEFAULT_LOG_FILTER,
};
use tracing_subscriber::EnvFilter;

#[test]
fn test_generated_ids_are_unique_uuids() {
    let a = generate_task_id();
    let b = generate_task_id();
    assert_ne!(a, b);
    assert!(uuid::Uuid::parse_str(&a).is_ok());
}

#[test]
fn test_manual_clock() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    let shared = clock.clone();
    shared.advance_ms(1_500);
    assert_eq!(clock.now(), start + chrono::Duration::milliseconds(1_500));
}

#[test]
fn test_system_clock_moves_forward() {
    let before = Utc::now();
    let now = SystemClock.now();
    assert!(now >= before);
}

#[test]
fn test_init_tracing_installs_global_subscriber_once() {
    let _ = init_tracing();
    assert!(tracing::dispatcher::has_been_set());
    assert!(!init_tracing());
    tracing::info!(target: "prometheus_task_queue", "subscriber active");
}

#[test]
fn test_default_log_filter_parses() {
    assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
}
