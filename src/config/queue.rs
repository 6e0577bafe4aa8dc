//! Queue configuration: defaults applied to tasks, concurrency, persistence and timing.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{SchedulerError, TaskDefaults};

/// Prefix for environment variables read by [`QueueConfig::from_env`].
pub const ENV_PREFIX: &str = "TASK_QUEUE_";

/// Queue-level configuration. Task-level values override the `max_retries`,
/// `retry_delay_ms` and `timeout_ms` defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueConfig {
    /// Maximum number of tasks running at once.
    pub concurrency: usize,
    /// Default retry budget.
    pub max_retries: u32,
    /// Default base backoff delay in milliseconds.
    pub retry_delay_ms: u64,
    /// Default per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Snapshot file; `None` keeps the queue in memory only.
    pub persist_path: Option<PathBuf>,
    /// Start the scheduler loop as soon as the queue is opened.
    pub auto_start: bool,
    /// Fixed scheduler cadence in milliseconds.
    pub tick_interval_ms: u64,
    /// Events buffered per subscriber before it lags.
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_retries: 3,
            retry_delay_ms: 5_000,
            timeout_ms: 300_000,
            persist_path: None,
            auto_start: false,
            tick_interval_ms: 1_000,
            event_capacity: 256,
        }
    }
}

impl QueueConfig {
    /// Configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency bound.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the default retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the default base backoff delay.
    #[must_use]
    pub const fn with_retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Set the default handler timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Persist snapshots to `path`.
    #[must_use]
    pub fn with_persist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }

    /// Start on open.
    #[must_use]
    pub const fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Set the scheduler cadence.
    #[must_use]
    pub const fn with_tick_interval_ms(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }

    /// Set the per-subscriber event buffer.
    #[must_use]
    pub const fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    /// Defaults handed to new tasks.
    #[must_use]
    pub const fn task_defaults(&self) -> TaskDefaults {
        TaskDefaults {
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            timeout_ms: self.timeout_ms,
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.concurrency == 0 {
            return Err(SchedulerError::InvalidConfig(
                "concurrency must be greater than 0".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(SchedulerError::InvalidConfig(
                "timeout_ms must be greater than 0".into(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(SchedulerError::InvalidConfig(
                "tick_interval_ms must be greater than 0".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(SchedulerError::InvalidConfig(
                "event_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] on malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| SchedulerError::InvalidConfig(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `TASK_QUEUE_*` environment variables, after loading a
    /// `.env` file if one is present. Unset variables keep their defaults.
    ///
    /// Recognized: `CONCURRENCY`, `MAX_RETRIES`, `RETRY_DELAY_MS`, `TIMEOUT_MS`,
    /// `PERSIST_PATH`, `AUTO_START`, `TICK_INTERVAL_MS`, `EVENT_CAPACITY`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] when a variable does not parse or the result is invalid.
    pub fn from_env() -> Result<Self, SchedulerError> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup using the `TASK_QUEUE_*` names.
    ///
    /// # Errors
    ///
    /// Same as [`QueueConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SchedulerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();

        if let Some(v) = get("CONCURRENCY") {
            cfg.concurrency = parse_var("CONCURRENCY", &v)?;
        }
        if let Some(v) = get("MAX_RETRIES") {
            cfg.max_retries = parse_var("MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("RETRY_DELAY_MS") {
            cfg.retry_delay_ms = parse_var("RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = get("TIMEOUT_MS") {
            cfg.timeout_ms = parse_var("TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("PERSIST_PATH") {
            let trimmed = v.trim();
            cfg.persist_path = (!trimmed.is_empty()).then(|| PathBuf::from(trimmed));
        }
        if let Some(v) = get("AUTO_START") {
            cfg.auto_start = parse_bool("AUTO_START", &v)?;
        }
        if let Some(v) = get("TICK_INTERVAL_MS") {
            cfg.tick_interval_ms = parse_var("TICK_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("EVENT_CAPACITY") {
            cfg.event_capacity = parse_var("EVENT_CAPACITY", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, SchedulerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| SchedulerError::InvalidConfig(format!("{ENV_PREFIX}{name}={value:?}: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, SchedulerError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SchedulerError::InvalidConfig(format!(
            "{ENV_PREFIX}{name}={value:?}: expected a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<String, String> = [
            ("TASK_QUEUE_CONCURRENCY", "2"),
            ("TASK_QUEUE_AUTO_START", "yes"),
            ("TASK_QUEUE_PERSIST_PATH", "/tmp/queue.json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let cfg = QueueConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.concurrency, 2);
        assert!(cfg.auto_start);
        assert_eq!(cfg.persist_path, Some(PathBuf::from("/tmp/queue.json")));
        assert_eq!(cfg.max_retries, 3);
    }

    #[test]
    fn lookup_rejects_garbage() {
        let err = QueueConfig::from_lookup(|k| {
            (k == "TASK_QUEUE_TIMEOUT_MS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("TASK_QUEUE_TIMEOUT_MS"));
    }
}
