//! Storage abstraction for topic log files.
//!
//! This module provides a trait-based storage abstraction allowing different
//! backends (`tokio::fs` for production, in-memory for testing).
//!
//! # Design
//!
//! The storage trait handles raw bytes at offsets. Higher-level concerns
//! (magic headers, frames, recovery) are handled by the log store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{LogError, LogResult};

/// Storage backend trait for topic log files.
///
/// Implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Opens or creates a file at the given path for read/write.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or created.
    async fn open(&self, path: &Path) -> LogResult<Box<dyn StorageFile>>;

    /// Lists the regular files directly inside a directory.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read.
    async fn list_dir(&self, dir: &Path) -> LogResult<Vec<PathBuf>>;

    /// Creates a directory and all parent directories.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    async fn create_dir_all(&self, path: &Path) -> LogResult<()>;
}

/// A handle to an open file for reading and writing.
#[async_trait]
pub trait StorageFile: Send + Sync {
    /// Writes data at the specified offset.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn write_at(&self, offset: u64, data: &[u8]) -> LogResult<()>;

    /// Reads the entire file contents.
    ///
    /// # Errors
    /// Returns an error if the read fails.
    async fn read_all(&self) -> LogResult<Bytes>;

    /// Syncs all buffered data to disk (fsync).
    ///
    /// Data written before a successful `sync()` survives crashes.
    ///
    /// # Errors
    /// Returns an error if the sync fails.
    async fn sync(&self) -> LogResult<()>;

    /// Returns the current file size in bytes.
    ///
    /// # Errors
    /// Returns an error if the size cannot be determined.
    async fn size(&self) -> LogResult<u64>;
}

/// Tokio-based file storage implementation.
///
/// Uses `tokio::fs` for async file operations. `tokio::fs` runs blocking
/// calls on a thread pool under the hood, which is adequate here: every
/// operation is short and bounded.
#[derive(Debug, Clone)]
pub struct TokioStorage;

impl TokioStorage {
    /// Creates a new Tokio storage instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for TokioStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for TokioStorage {
    async fn open(&self, path: &Path) -> LogResult<Box<dyn StorageFile>> {
        use tokio::fs::OpenOptions;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await
            .map_err(|e| LogError::io("open", e))?;

        Ok(Box::new(TokioFile {
            file: tokio::sync::Mutex::new(file),
        }))
    }

    async fn list_dir(&self, dir: &Path) -> LogResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| LogError::io("read_dir", e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LogError::io("read_dir_entry", e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| LogError::io("file_type", e))?;
            if file_type.is_file() {
                files.push(entry.path());
            }
        }

        // Sort by filename for deterministic ordering.
        files.sort();
        Ok(files)
    }

    async fn create_dir_all(&self, path: &Path) -> LogResult<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| LogError::io("create_dir_all", e))
    }
}

/// A file handle using `tokio::fs`.
struct TokioFile {
    file: tokio::sync::Mutex<tokio::fs::File>,
}

#[async_trait]
#[allow(clippy::significant_drop_tightening)]
impl StorageFile for TokioFile {
    async fn write_at(&self, offset: u64, data: &[u8]) -> LogResult<()> {
        use tokio::io::{AsyncSeekExt, AsyncWriteExt};

        let mut file = self.file.lock().await;
        file.seek(std::io::SeekFrom::Start(offset))
            .await
            .map_err(|e| LogError::io("seek", e))?;
        file.write_all(data)
            .await
            .map_err(|e| LogError::io("write", e))?;
        Ok(())
    }

    async fn read_all(&self) -> LogResult<Bytes> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let mut file = self.file.lock().await;
        file.seek(std::io::SeekFrom::Start(0))
            .await
            .map_err(|e| LogError::io("seek", e))?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .await
            .map_err(|e| LogError::io("read", e))?;
        Ok(Bytes::from(buf))
    }

    async fn sync(&self) -> LogResult<()> {
        let file = self.file.lock().await;
        file.sync_all().await.map_err(|e| LogError::io("sync", e))
    }

    async fn size(&self) -> LogResult<u64> {
        let file = self.file.lock().await;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| LogError::io("metadata", e))?;
        Ok(metadata.len())
    }
}

// ----------------------------------------------------------------------------
// Simulated storage for testing
// ----------------------------------------------------------------------------

/// Fault injection configuration for simulated storage.
///
/// Each flag is one-shot: it fails the next matching operation and clears
/// itself, so tests can verify both the failure and the recovery path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultConfig {
    /// Fail the next write with an I/O error.
    pub force_write_fail: bool,
    /// Fail the next fsync with an I/O error.
    pub force_sync_fail: bool,
}

/// In-memory storage for deterministic testing.
///
/// Keeps all file contents in memory and supports one-shot fault injection
/// for exercising write-failure degradation paths. Clones share state.
///
/// # Panics
///
/// Methods panic if an internal lock is poisoned, which indicates a prior
/// panic in a critical section. Acceptable for test code.
#[derive(Debug, Clone, Default)]
pub struct SimulatedStorage {
    /// In-memory file contents.
    files: std::sync::Arc<std::sync::Mutex<std::collections::HashMap<PathBuf, Vec<u8>>>>,
    /// Fault injection configuration.
    fault_config: std::sync::Arc<std::sync::Mutex<FaultConfig>>,
}

impl SimulatedStorage {
    /// Creates a new simulated storage with no faults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fault configuration for modification.
    #[must_use]
    pub fn fault_config(&self) -> std::sync::MutexGuard<'_, FaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }

    /// Returns the raw content of a file, if it exists.
    #[must_use]
    pub fn raw_content(&self, path: &Path) -> Option<Vec<u8>> {
        let files = self.files.lock().expect("files lock poisoned");
        files.get(path).cloned()
    }

    /// Sets the raw content of a file directly (for planting stray or
    /// corrupt files in tests).
    pub fn set_raw_content(&self, path: &Path, content: Vec<u8>) {
        let mut files = self.files.lock().expect("files lock poisoned");
        files.insert(path.to_path_buf(), content);
    }
}

#[async_trait]
impl Storage for SimulatedStorage {
    async fn open(&self, path: &Path) -> LogResult<Box<dyn StorageFile>> {
        {
            let mut files = self.files.lock().expect("files lock poisoned");
            files.entry(path.to_path_buf()).or_default();
        }

        Ok(Box::new(SimulatedFile {
            path: path.to_path_buf(),
            files: std::sync::Arc::clone(&self.files),
            fault_config: std::sync::Arc::clone(&self.fault_config),
        }))
    }

    async fn list_dir(&self, dir: &Path) -> LogResult<Vec<PathBuf>> {
        let files = self.files.lock().expect("files lock poisoned");
        let mut result: Vec<_> = files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect();
        result.sort();
        Ok(result)
    }

    async fn create_dir_all(&self, _path: &Path) -> LogResult<()> {
        // Directories are implicit in simulated storage.
        Ok(())
    }
}

/// A simulated file handle with fault injection.
struct SimulatedFile {
    path: PathBuf,
    files: std::sync::Arc<std::sync::Mutex<std::collections::HashMap<PathBuf, Vec<u8>>>>,
    fault_config: std::sync::Arc<std::sync::Mutex<FaultConfig>>,
}

impl SimulatedFile {
    /// Checks and clears a one-shot fault flag.
    fn take_fault(&self, which: fn(&mut FaultConfig) -> &mut bool) -> bool {
        let mut config = self.fault_config.lock().expect("fault config lock poisoned");
        let flag = which(&mut config);
        std::mem::take(flag)
    }
}

#[async_trait]
impl StorageFile for SimulatedFile {
    async fn write_at(&self, offset: u64, data: &[u8]) -> LogResult<()> {
        if self.take_fault(|c| &mut c.force_write_fail) {
            return Err(LogError::io("write", "injected write failure"));
        }

        let mut files = self.files.lock().expect("files lock poisoned");
        let content = files.entry(self.path.clone()).or_default();

        // Safe cast: test files are small.
        #[allow(clippy::cast_possible_truncation)]
        let offset = offset as usize;
        let end = offset + data.len();
        if content.len() < end {
            content.resize(end, 0);
        }
        content[offset..end].copy_from_slice(data);
        Ok(())
    }

    async fn read_all(&self) -> LogResult<Bytes> {
        let files = self.files.lock().expect("files lock poisoned");
        let content = files
            .get(&self.path)
            .ok_or_else(|| LogError::io("read", "file not found"))?;
        Ok(Bytes::from(content.clone()))
    }

    async fn sync(&self) -> LogResult<()> {
        if self.take_fault(|c| &mut c.force_sync_fail) {
            return Err(LogError::io("sync", "injected fsync failure"));
        }
        Ok(())
    }

    async fn size(&self) -> LogResult<u64> {
        let files = self.files.lock().expect("files lock poisoned");
        let content = files
            .get(&self.path)
            .ok_or_else(|| LogError::io("size", "file not found"))?;
        Ok(content.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_storage_write_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("topic");

        let storage = TokioStorage::new();
        let file = storage.open(&path).await.unwrap();

        let data = b"hello, world!";
        file.write_at(0, data).await.unwrap();
        file.sync().await.unwrap();

        let read_back = file.read_all().await.unwrap();
        assert_eq!(&read_back[..], data);
        assert_eq!(file.size().await.unwrap(), data.len() as u64);
    }

    #[tokio::test]
    async fn test_tokio_storage_list_dir_skips_subdirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = TokioStorage::new();

        for name in ["a", "b"] {
            let _ = storage.open(&temp_dir.path().join(name)).await.unwrap();
        }
        std::fs::create_dir(temp_dir.path().join("subdir")).unwrap();

        let files = storage.list_dir(temp_dir.path()).await.unwrap();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_simulated_storage_basic_operations() {
        let storage = SimulatedStorage::new();
        let path = Path::new("/data/topic");

        let file = storage.open(path).await.unwrap();
        file.write_at(0, b"abc").await.unwrap();
        file.write_at(3, b"def").await.unwrap();
        file.sync().await.unwrap();

        assert_eq!(&file.read_all().await.unwrap()[..], b"abcdef");
        assert_eq!(file.size().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_simulated_storage_write_fault_is_one_shot() {
        let storage = SimulatedStorage::new();
        let path = Path::new("/data/topic");
        let file = storage.open(path).await.unwrap();

        storage.fault_config().force_write_fail = true;
        assert!(file.write_at(0, b"x").await.is_err());
        assert!(file.write_at(0, b"x").await.is_ok());
    }

    #[tokio::test]
    async fn test_simulated_storage_sync_fault_is_one_shot() {
        let storage = SimulatedStorage::new();
        let path = Path::new("/data/topic");
        let file = storage.open(path).await.unwrap();

        storage.fault_config().force_sync_fail = true;
        assert!(file.sync().await.is_err());
        assert!(file.sync().await.is_ok());
    }

    #[tokio::test]
    async fn test_simulated_storage_clone_shares_state() {
        let storage = SimulatedStorage::new();
        let path = Path::new("/data/shared");

        let file = storage.open(path).await.unwrap();
        file.write_at(0, b"original").await.unwrap();

        let storage2 = storage.clone();
        assert_eq!(storage.raw_content(path), storage2.raw_content(path));
    }
}
