//! Topic log store.
//!
//! One file per topic under a single data directory. The store keeps no
//! in-memory state of its own; the broker owns the authoritative message
//! sequences and calls down here for durability and recovery.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use tracing::{debug, info, warn};

use crate::error::{LogError, LogResult};
use crate::frame;
use crate::storage::Storage;

/// Durable store for per-topic message logs.
///
/// Generic over the storage backend `S` so tests can run against in-memory
/// storage with fault injection.
pub struct TopicLogStore<S: Storage> {
    /// Storage backend.
    storage: Arc<S>,
    /// Directory holding one log file per topic.
    dir: PathBuf,
}

impl<S: Storage> TopicLogStore<S> {
    /// Opens a log store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub async fn open(storage: S, dir: impl Into<PathBuf>) -> LogResult<Self> {
        let dir = dir.into();
        let storage = Arc::new(storage);
        storage.create_dir_all(&dir).await?;
        Ok(Self { storage, dir })
    }

    /// Returns the path of one topic's log file.
    fn topic_path(&self, topic: &str) -> PathBuf {
        self.dir.join(topic)
    }

    /// Persists a new topic as an empty log (magic header only).
    ///
    /// # Errors
    /// Returns an error if the write or sync fails.
    pub async fn create(&self, topic: &str) -> LogResult<()> {
        let file = self.storage.open(&self.topic_path(topic)).await?;
        file.write_at(0, &frame::MAGIC).await?;
        file.sync().await
    }

    /// Appends one message frame to the end of a topic's log and syncs.
    ///
    /// # Errors
    /// Returns an error if the payload is oversized or the write/sync fails.
    pub async fn append(&self, topic: &str, payload: &[u8]) -> LogResult<()> {
        let encoded = frame::encode_frame(payload)?;
        let file = self.storage.open(&self.topic_path(topic)).await?;

        let mut end = file.size().await?;
        if end == 0 {
            // A log always carries the magic header; restore it if the file
            // is unexpectedly empty.
            file.write_at(0, &frame::MAGIC).await?;
            end = frame::MAGIC.len() as u64;
        }

        file.write_at(end, &encoded).await?;
        file.sync().await
    }

    /// Reads the full message sequence of one topic's log.
    ///
    /// # Errors
    /// Returns [`LogError::BadMagic`] if the file does not start with the
    /// magic signature, or [`LogError::TruncatedFrame`] if a frame claims
    /// more bytes than remain.
    pub async fn read(&self, topic: &str) -> LogResult<Vec<Bytes>> {
        let path = self.topic_path(topic);
        let file = self.storage.open(&path).await?;
        let data = file.read_all().await?;
        Self::decode_log(&path, data)
    }

    /// Scans the data directory and rebuilds every topic's message sequence.
    ///
    /// Any regular file whose first bytes are the magic signature is a topic
    /// log named after the file. Other files are skipped silently; corrupt
    /// or unreadable logs are skipped with a warning so that one bad file
    /// never aborts the scan.
    ///
    /// # Errors
    /// Returns an error only if the directory itself cannot be listed.
    pub async fn recover_all(&self) -> LogResult<HashMap<String, Vec<Bytes>>> {
        let files = self.storage.list_dir(&self.dir).await?;

        let mut topics = HashMap::new();
        for path in files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let data = match self.storage.open(&path).await {
                Ok(file) => match file.read_all().await {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable file");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unopenable file");
                    continue;
                }
            };

            if data.len() < frame::MAGIC.len() || data[..frame::MAGIC.len()] != frame::MAGIC {
                debug!(path = %path.display(), "skipping non-log file");
                continue;
            }

            match Self::decode_log(&path, data) {
                Ok(messages) => {
                    info!(topic = name, messages = messages.len(), "recovered topic log");
                    topics.insert(name.to_string(), messages);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt topic log");
                }
            }
        }

        Ok(topics)
    }

    /// Decodes a complete log file (magic header plus frames).
    fn decode_log(path: &std::path::Path, data: Bytes) -> LogResult<Vec<Bytes>> {
        if data.len() < frame::MAGIC.len() || data[..frame::MAGIC.len()] != frame::MAGIC {
            return Err(LogError::BadMagic {
                path: path.to_path_buf(),
            });
        }

        let mut offset = frame::MAGIC.len() as u64;
        let mut buf = data.slice(frame::MAGIC.len()..);
        let mut messages = Vec::new();
        while buf.has_remaining() {
            let payload = frame::decode_frame(&mut buf, offset)?;
            offset += (frame::FRAME_HEADER_SIZE + payload.len()) as u64;
            messages.push(payload);
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SimulatedStorage;

    async fn store() -> (SimulatedStorage, TopicLogStore<SimulatedStorage>) {
        let storage = SimulatedStorage::new();
        let store = TopicLogStore::open(storage.clone(), "/data").await.unwrap();
        (storage, store)
    }

    #[tokio::test]
    async fn test_create_writes_magic_only() {
        let (storage, store) = store().await;
        store.create("orders").await.unwrap();

        let content = storage.raw_content(std::path::Path::new("/data/orders")).unwrap();
        assert_eq!(content, frame::MAGIC);
        assert!(store.read("orders").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_then_read_preserves_order() {
        let (_storage, store) = store().await;
        store.create("orders").await.unwrap();

        for payload in [b"one".as_slice(), b"two", b"three"] {
            store.append("orders", payload).await.unwrap();
        }

        let messages = store.read("orders").await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(&messages[0][..], b"one");
        assert_eq!(&messages[1][..], b"two");
        assert_eq!(&messages[2][..], b"three");
    }

    #[tokio::test]
    async fn test_read_rejects_bad_magic() {
        let (storage, store) = store().await;
        storage.set_raw_content(std::path::Path::new("/data/orders"), b"JUNKdata".to_vec());

        let result = store.read("orders").await;
        assert!(matches!(result, Err(LogError::BadMagic { .. })));
    }

    #[tokio::test]
    async fn test_read_rejects_truncated_frame() {
        let (storage, store) = store().await;
        // Magic plus a frame claiming 100 bytes with only 3 present.
        let mut content = frame::MAGIC.to_vec();
        content.extend_from_slice(&100u32.to_be_bytes());
        content.extend_from_slice(b"abc");
        storage.set_raw_content(std::path::Path::new("/data/orders"), content);

        let result = store.read("orders").await;
        assert!(matches!(
            result,
            Err(LogError::TruncatedFrame {
                expected: 100,
                found: 3,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_recover_all_skips_stray_and_corrupt_files() {
        let (storage, store) = store().await;
        store.create("good").await.unwrap();
        store.append("good", b"msg").await.unwrap();

        // A stray file without the magic signature.
        storage.set_raw_content(std::path::Path::new("/data/stray"), b"not a log".to_vec());
        // A log with the magic but a truncated trailing frame.
        let mut corrupt = frame::MAGIC.to_vec();
        corrupt.extend_from_slice(&9u32.to_be_bytes());
        corrupt.extend_from_slice(b"short");
        storage.set_raw_content(std::path::Path::new("/data/corrupt"), corrupt);

        let topics = store.recover_all().await.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics["good"].len(), 1);
    }

    #[tokio::test]
    async fn test_recover_all_roundtrip() {
        let (storage, store) = store().await;
        store.create("a").await.unwrap();
        store.append("a", b"1").await.unwrap();
        store.append("a", b"2").await.unwrap();
        store.create("b").await.unwrap();

        // A second store over the same backing storage sees the same state.
        let recovered = TopicLogStore::open(storage, "/data")
            .await
            .unwrap()
            .recover_all()
            .await
            .unwrap();
        assert_eq!(recovered.len(), 2);
        assert_eq!(recovered["a"].len(), 2);
        assert!(recovered["b"].is_empty());
    }

    #[tokio::test]
    async fn test_append_failure_surfaces_io_error() {
        let (storage, store) = store().await;
        store.create("orders").await.unwrap();

        storage.fault_config().force_write_fail = true;
        let result = store.append("orders", b"msg").await;
        assert!(matches!(result, Err(LogError::Io { .. })));

        // The next append succeeds; the log stays readable.
        store.append("orders", b"msg").await.unwrap();
        assert_eq!(store.read("orders").await.unwrap().len(), 1);
    }
}
