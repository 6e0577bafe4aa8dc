//! Structured logging setup for embedders and the test suites.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable: queue lifecycle at info,
/// everything else at warn.
pub const DEFAULT_LOG_FILTER: &str = "warn,prometheus_task_queue=info";

/// Install a fmt subscriber filtered by `RUST_LOG` (falling back to
/// [`DEFAULT_LOG_FILTER`]), unless a global subscriber already exists.
///
/// Output goes through the test writer, so `cargo test` captures it per test.
/// Returns `true` when this call installed the subscriber.
pub fn init_tracing() -> bool {
    if tracing::dispatcher::has_been_set() {
        return false;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_test_writer()
        .try_init()
        .is_ok()
}
