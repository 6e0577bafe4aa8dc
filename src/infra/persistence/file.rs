//! JSON snapshot file with atomic whole-file replacement.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::SnapshotStore;
use crate::core::{SchedulerError, Snapshot};

/// Pretty-printed JSON snapshot at a fixed path.
///
/// Saves go to a uniquely named temp file in the target's directory, are fsynced, then
/// renamed over the target. Parent directories are created on first save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "snapshot".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self) -> Result<Option<Snapshot>, SchedulerError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SchedulerError::Persistence(format!(
                    "read {}: {e}",
                    self.path.display()
                )))
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            SchedulerError::Persistence(format!("parse {}: {e}", self.path.display()))
        })
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), SchedulerError> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| SchedulerError::Persistence(format!("serialize snapshot: {e}")))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| SchedulerError::Persistence(format!("snapshot writer: {e}")))?
            .map_err(|e| SchedulerError::Persistence(format!("write {}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TaskConfig, TaskDefaults, TaskStore};
    use chrono::Utc;

    fn snapshot() -> Snapshot {
        let mut store = TaskStore::new();
        let task = TaskConfig::new("file.test")
            .with_id("a")
            .into_task(
                TaskDefaults {
                    max_retries: 1,
                    retry_delay_ms: 10,
                    timeout_ms: 100,
                },
                Utc::now(),
            )
            .unwrap();
        store.insert(task).unwrap();
        store.snapshot(Utc::now())
    }

    #[tokio::test]
    async fn missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("queue.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_creates_parents_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.json");
        let store = JsonFileStore::new(&path);
        let snap = snapshot();

        store.save(&snap).await.unwrap();
        store.save(&snap).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(snap));
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("queue.json")]);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        fs::write(&path, b"{ not json").unwrap();
        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, SchedulerError::Persistence(_)));
    }

    #[test]
    fn snapshot_json_uses_wire_names() {
        let value = serde_json::to_value(snapshot()).unwrap();
        assert!(value["deadLetterQueue"].is_array());
        assert!(value["timestamp"].is_string());
        let task = &value["tasks"][0];
        assert_eq!(task["type"], "file.test");
        assert_eq!(task["status"], "pending");
        assert_eq!(task["priority"], 2);
        assert_eq!(task["maxRetries"], 1);
    }
}
