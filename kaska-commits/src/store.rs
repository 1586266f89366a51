//! Commit store trait and backends.
//!
//! Provides the [`CommitStore`] trait for persisting committed offsets, a
//! filesystem backend for production, and an in-memory simulated backend
//! with fault injection for testing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kaska_core::{is_valid_name, Offset};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{CommitError, CommitResult};

/// Durable storage for one committed offset per (client, topic) pair.
#[async_trait]
pub trait CommitStore: Send + Sync {
    /// Durably saves the committed offset for one (client, topic) pair,
    /// replacing any previous value.
    ///
    /// # Errors
    /// Returns an error if the offset could not be persisted.
    async fn save(&self, client: &str, topic: &str, offset: Offset) -> CommitResult<()>;

    /// Loads the saved offset for one (client, topic) pair.
    ///
    /// `None` means "never committed": the file is missing or its content
    /// is not a decimal offset.
    ///
    /// # Errors
    /// Returns an error only if the store itself could not be read.
    async fn load(&self, client: &str, topic: &str) -> CommitResult<Option<Offset>>;
}

// -----------------------------------------------------------------------------
// Filesystem backend
// -----------------------------------------------------------------------------

/// Filesystem-backed commit store.
///
/// One directory per client under the commits root, one file per topic
/// holding the decimal ASCII offset. Saves are atomic: the offset is
/// written to a temp file, fsynced, and renamed over the target.
#[derive(Debug, Clone)]
pub struct FsCommitStore {
    /// Root directory for commit files.
    dir: PathBuf,
}

impl FsCommitStore {
    /// Opens a commit store rooted at `dir`, creating the directory if
    /// needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> CommitResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CommitError::io("create_dir_all", e))?;
        Ok(Self { dir })
    }

    /// Rejects names that cannot safely become path components.
    fn check_name(name: &str) -> CommitResult<()> {
        if is_valid_name(name) {
            Ok(())
        } else {
            Err(CommitError::InvalidName {
                name: name.to_string(),
            })
        }
    }
}

#[async_trait]
impl CommitStore for FsCommitStore {
    async fn save(&self, client: &str, topic: &str, offset: Offset) -> CommitResult<()> {
        Self::check_name(client)?;
        Self::check_name(topic)?;

        let client_dir = self.dir.join(client);
        tokio::fs::create_dir_all(&client_dir)
            .await
            .map_err(|e| CommitError::io("create_dir_all", e))?;

        // Temp names start with '.' and so can never collide with a topic
        // file, since valid topic names cannot start with '.'.
        let tmp_path = client_dir.join(format!(".{topic}.tmp"));
        let target_path = client_dir.join(topic);

        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| CommitError::io("create", e))?;
        file.write_all(offset.get().to_string().as_bytes())
            .await
            .map_err(|e| CommitError::io("write", e))?;
        file.sync_all()
            .await
            .map_err(|e| CommitError::io("sync", e))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &target_path)
            .await
            .map_err(|e| CommitError::io("rename", e))?;

        debug!(client, topic, %offset, "saved committed offset");
        Ok(())
    }

    async fn load(&self, client: &str, topic: &str) -> CommitResult<Option<Offset>> {
        Self::check_name(client)?;
        Self::check_name(topic)?;

        let path = self.dir.join(client).join(topic);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CommitError::io("read", e)),
        };

        Ok(content.trim().parse::<u64>().ok().map(Offset::new))
    }
}

// -----------------------------------------------------------------------------
// Simulated backend for testing
// -----------------------------------------------------------------------------

/// Fault injection configuration for the simulated commit store.
///
/// Each flag is one-shot: it fails the next matching operation and clears
/// itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitStoreFaultConfig {
    /// Fail the next save with an I/O error.
    pub force_save_fail: bool,
    /// Fail the next load with an I/O error.
    pub force_load_fail: bool,
}

/// In-memory commit store for deterministic testing.
///
/// Clones share state, so a "restarted" component handed a clone sees the
/// offsets persisted before the restart.
///
/// # Panics
///
/// Methods panic if an internal lock is poisoned, which indicates a prior
/// panic in a critical section. Acceptable for test code.
#[derive(Debug, Clone, Default)]
pub struct SimulatedCommitStore {
    /// Saved offsets keyed by (client, topic).
    offsets: Arc<Mutex<HashMap<(String, String), Offset>>>,
    /// Fault injection configuration.
    fault_config: Arc<Mutex<CommitStoreFaultConfig>>,
}

impl SimulatedCommitStore {
    /// Creates a new simulated commit store with no faults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fault configuration for modification.
    #[must_use]
    pub fn fault_config(&self) -> std::sync::MutexGuard<'_, CommitStoreFaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }
}

#[async_trait]
impl CommitStore for SimulatedCommitStore {
    async fn save(&self, client: &str, topic: &str, offset: Offset) -> CommitResult<()> {
        {
            let mut config = self.fault_config.lock().expect("fault config lock poisoned");
            if std::mem::take(&mut config.force_save_fail) {
                return Err(CommitError::io("save", "injected save failure"));
            }
        }

        let mut offsets = self.offsets.lock().expect("offsets lock poisoned");
        offsets.insert((client.to_string(), topic.to_string()), offset);
        Ok(())
    }

    async fn load(&self, client: &str, topic: &str) -> CommitResult<Option<Offset>> {
        {
            let mut config = self.fault_config.lock().expect("fault config lock poisoned");
            if std::mem::take(&mut config.force_load_fail) {
                return Err(CommitError::io("load", "injected load failure"));
            }
        }

        let offsets = self.offsets.lock().expect("offsets lock poisoned");
        Ok(offsets
            .get(&(client.to_string(), topic.to_string()))
            .copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_save_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::open(temp_dir.path()).await.unwrap();

        store.save("consumer-1", "orders", Offset::new(42)).await.unwrap();
        let loaded = store.load("consumer-1", "orders").await.unwrap();
        assert_eq!(loaded, Some(Offset::new(42)));
    }

    #[tokio::test]
    async fn test_fs_save_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::open(temp_dir.path()).await.unwrap();

        store.save("c", "t", Offset::new(1)).await.unwrap();
        store.save("c", "t", Offset::new(2)).await.unwrap();
        assert_eq!(store.load("c", "t").await.unwrap(), Some(Offset::new(2)));
    }

    #[tokio::test]
    async fn test_fs_file_is_ascii_decimal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::open(temp_dir.path()).await.unwrap();

        store.save("consumer-1", "orders", Offset::new(42)).await.unwrap();
        let content =
            std::fs::read_to_string(temp_dir.path().join("consumer-1").join("orders")).unwrap();
        assert_eq!(content, "42");
    }

    #[tokio::test]
    async fn test_fs_leaves_no_temp_file_behind() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::open(temp_dir.path()).await.unwrap();

        store.save("c", "orders", Offset::new(3)).await.unwrap();
        let entries: Vec<_> = std::fs::read_dir(temp_dir.path().join("c"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("orders")]);
    }

    #[tokio::test]
    async fn test_fs_missing_file_loads_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::open(temp_dir.path()).await.unwrap();

        assert_eq!(store.load("nobody", "orders").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fs_unparsable_file_loads_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::open(temp_dir.path()).await.unwrap();

        let client_dir = temp_dir.path().join("c");
        std::fs::create_dir_all(&client_dir).unwrap();
        std::fs::write(client_dir.join("orders"), "not a number").unwrap();

        assert_eq!(store.load("c", "orders").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fs_rejects_unsafe_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::open(temp_dir.path()).await.unwrap();

        let result = store.save("../escape", "orders", Offset::new(0)).await;
        assert!(matches!(result, Err(CommitError::InvalidName { .. })));

        let result = store.load("c", ".hidden").await;
        assert!(matches!(result, Err(CommitError::InvalidName { .. })));
    }

    #[tokio::test]
    async fn test_simulated_save_fault_is_one_shot() {
        let store = SimulatedCommitStore::new();

        store.fault_config().force_save_fail = true;
        assert!(store.save("c", "t", Offset::new(1)).await.is_err());
        assert_eq!(store.load("c", "t").await.unwrap(), None);

        store.save("c", "t", Offset::new(1)).await.unwrap();
        assert_eq!(store.load("c", "t").await.unwrap(), Some(Offset::new(1)));
    }

    #[tokio::test]
    async fn test_simulated_clone_shares_state() {
        let store = SimulatedCommitStore::new();
        store.save("c", "t", Offset::new(9)).await.unwrap();

        let restarted = store.clone();
        assert_eq!(restarted.load("c", "t").await.unwrap(), Some(Offset::new(9)));
    }
}
