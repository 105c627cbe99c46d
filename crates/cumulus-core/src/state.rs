//! State management for reconciled resources
//!
//! Manages the `.cumulus/state.json` file which maps each declared resource
//! key (`kind.name`) to the remote ID and last observed state.

use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".cumulus";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TEMP: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// Persisted record of one reconciled resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Resource kind (e.g. "backup_policy")
    pub kind: String,

    /// Remote-assigned ID
    pub id: String,

    /// Spec last applied; absent for imported resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,

    /// Observed state from the last read
    pub observed: serde_json::Value,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(
        kind: impl Into<String>,
        id: impl Into<String>,
        observed: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            kind: kind.into(),
            id: id.into(),
            spec: None,
            observed,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = Some(spec);
        self
    }

    /// Replace the observed state, keeping the creation time
    pub fn observe(&mut self, observed: serde_json::Value) {
        self.observed = observed;
        self.updated_at = Utc::now();
    }
}

/// Contents of the state file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Records indexed by resource key
    pub resources: BTreeMap<String, ResourceRecord>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

/// Storage of reconciled records between runs
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<ResourceRecord>>;

    async fn save(&self, key: &str, record: ResourceRecord) -> Result<()>;

    /// Forget a record; clearing a missing key is not an error
    async fn clear(&self, key: &str) -> Result<()>;

    /// All records, ordered by key
    async fn list(&self) -> Result<Vec<(String, ResourceRecord)>>;
}

/// JSON file store under `<root>/.cumulus`
pub struct FileStateStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write: Mutex<()>,
}

impl FileStateStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            write: Mutex::new(()),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn temp_path(&self) -> PathBuf {
        self.state_dir().join(STATE_TEMP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the whole state file; a missing file is an empty state
    pub async fn read_state(&self) -> Result<StateFile> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(StateFile::default());
        }

        let content = fs::read_to_string(&path).await?;
        let state: StateFile = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(ReconcileError::State(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Write the state file, copying the previous one to the backup
    ///
    /// The new content is written to a temporary file and renamed into
    /// place, so `state.json` is never missing or partially written.
    async fn write_state(&self, state: &StateFile) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let temp = self.temp_path();

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&temp, content).await?;

        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
            tracing::debug!("Created state backup");
        }
        fs::rename(&temp, &path).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Acquire the advisory lock for exclusive access across processes
    ///
    /// A lock older than one hour is considered stale and taken over.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(ReconcileError::Lock(format!(
                    "State is locked by {} since {}",
                    lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, key: &str) -> Result<Option<ResourceRecord>> {
        Ok(self.read_state().await?.resources.remove(key))
    }

    async fn save(&self, key: &str, record: ResourceRecord) -> Result<()> {
        let _guard = self.write.lock().await;
        let mut state = self.read_state().await?;
        state.resources.insert(key.to_string(), record);
        state.updated_at = Utc::now();
        self.write_state(&state).await
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let _guard = self.write.lock().await;
        let mut state = self.read_state().await?;
        if state.resources.remove(key).is_none() {
            return Ok(());
        }
        state.updated_at = Utc::now();
        self.write_state(&state).await
    }

    async fn list(&self) -> Result<Vec<(String, ResourceRecord)>> {
        Ok(self.read_state().await?.resources.into_iter().collect())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    #[serde(default)]
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(id: &str) -> ResourceRecord {
        ResourceRecord::new("backup_policy", id, json!({"id": id, "status": "ON"}))
            .with_spec(json!({"name": "p1"}))
    }

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let store = FileStateStore::new(temp_dir.path());

        store.save("backup_policy.p1", record("abc123")).await.unwrap();

        let loaded = store.load("backup_policy.p1").await.unwrap().unwrap();
        assert_eq!(loaded.id, "abc123");
        assert_eq!(loaded.spec, Some(json!({"name": "p1"})));
        assert!(store.load("backup_policy.other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let store = FileStateStore::new(temp_dir.path());

        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.state_path().exists());
    }

    #[tokio::test]
    async fn test_clear_and_backup() {
        let temp_dir = tempdir().unwrap();
        let store = FileStateStore::new(temp_dir.path());

        store.save("network.a", record("n1")).await.unwrap();
        store.save("network.b", record("n2")).await.unwrap();
        store.clear("network.a").await.unwrap();
        store.clear("network.missing").await.unwrap();

        let keys: Vec<String> = store.list().await.unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["network.b".to_string()]);
        assert!(temp_dir.path().join(".cumulus/state.json.backup").exists());
        assert!(!temp_dir.path().join(".cumulus/state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_state() {
        let temp_dir = tempdir().unwrap();
        let store = FileStateStore::new(temp_dir.path());
        store.save("network.a", record("n1")).await.unwrap();

        // a directory in the way makes the next write fail
        std::fs::create_dir(temp_dir.path().join(".cumulus/state.json.tmp")).unwrap();
        assert!(store.save("network.b", record("n2")).await.is_err());

        let reopened = FileStateStore::new(temp_dir.path());
        let keys: Vec<String> = reopened
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["network.a".to_string()]);
    }

    #[tokio::test]
    async fn test_backup_holds_previous_state() {
        let temp_dir = tempdir().unwrap();
        let store = FileStateStore::new(temp_dir.path());
        store.save("network.a", record("n1")).await.unwrap();
        store.save("network.b", record("n2")).await.unwrap();

        let backup =
            std::fs::read_to_string(temp_dir.path().join(".cumulus/state.json.backup")).unwrap();
        let previous: StateFile = serde_json::from_str(&backup).unwrap();
        assert!(previous.resources.contains_key("network.a"));
        assert!(!previous.resources.contains_key("network.b"));
    }

    #[tokio::test]
    async fn test_newer_version_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let store = FileStateStore::new(temp_dir.path());
        std::fs::create_dir_all(temp_dir.path().join(".cumulus")).unwrap();
        std::fs::write(
            store.state_path(),
            r#"{"version": 99, "updated_at": "2024-01-01T00:00:00Z", "resources": {}}"#,
        )
        .unwrap();

        let err = store.list().await.unwrap_err();
        assert!(matches!(err, ReconcileError::State(_)));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let temp_dir = tempdir().unwrap();
        let store = FileStateStore::new(temp_dir.path());

        let lock = store.acquire_lock().await.unwrap();
        assert!(matches!(
            store.acquire_lock().await,
            Err(ReconcileError::Lock(_))
        ));

        lock.release().await.unwrap();
        let again = store.acquire_lock().await.unwrap();
        drop(again);
        assert!(!temp_dir.path().join(".cumulus/lock.json").exists());
    }

    #[tokio::test]
    async fn test_stale_lock_is_taken_over() {
        let temp_dir = tempdir().unwrap();
        let store = FileStateStore::new(temp_dir.path());
        std::fs::create_dir_all(temp_dir.path().join(".cumulus")).unwrap();
        std::fs::write(
            temp_dir.path().join(".cumulus/lock.json"),
            r#"{"holder": "old-host", "acquired_at": "2020-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert!(store.acquire_lock().await.is_ok());
    }
}
