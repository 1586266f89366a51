//! The broker state machine.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use kaska_commits::CommitStore;
use kaska_core::{is_valid_name, ApiResult, BrokerApi, Offset, TopicOffset};
use kaska_log::{Storage, TopicLogStore};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// All mutable broker state, guarded by a single mutex.
struct BrokerState {
    /// Topic name to its full in-memory message sequence.
    topics: HashMap<String, Vec<Bytes>>,
    /// Client identifier to (topic to last committed offset).
    client_offsets: HashMap<String, HashMap<String, Offset>>,
}

/// The broker state machine.
///
/// Owns the topic table and the per-client committed-offset table, and
/// persists through the log store and commit store synchronously: a
/// state-changing operation returns success only after the corresponding
/// disk write has completed.
///
/// # Concurrency
///
/// All state sits behind one `tokio::sync::Mutex`, so every operation -
/// including its disk I/O - runs as a serializable transaction. Poll,
/// commit and committed can therefore never observe a partial update from
/// a concurrent send or commit.
pub struct Broker<S: Storage, C: CommitStore> {
    /// Guarded mutable state.
    state: Mutex<BrokerState>,
    /// Durable topic log storage.
    logs: TopicLogStore<S>,
    /// Durable committed-offset storage.
    commits: C,
}

impl<S: Storage, C: CommitStore> Broker<S, C> {
    /// Creates a broker, rebuilding all topics from the log store.
    ///
    /// A failed directory scan aborts only the scan, not startup: the
    /// broker comes up empty and keeps serving.
    pub async fn recover(logs: TopicLogStore<S>, commits: C) -> Self {
        let topics = match logs.recover_all().await {
            Ok(topics) => topics,
            Err(e) => {
                warn!(error = %e, "topic recovery scan aborted, starting empty");
                HashMap::new()
            }
        };
        info!(topics = topics.len(), "broker state recovered");

        Self {
            state: Mutex::new(BrokerState {
                topics,
                client_offsets: HashMap::new(),
            }),
            logs,
            commits,
        }
    }

    /// Creates the named topics, returning how many were newly created.
    ///
    /// Duplicate names in the input collapse to one creation attempt and
    /// pre-existing topics are no-ops. Each new topic is persisted empty
    /// before it is counted; a topic whose log cannot be written is not
    /// created.
    pub async fn create_topics(&self, names: &[String]) -> u64 {
        let mut state = self.state.lock().await;
        let unique: BTreeSet<&String> = names.iter().collect();

        let mut created = 0;
        for name in unique {
            if state.topics.contains_key(name.as_str()) {
                continue;
            }
            if !is_valid_name(name) {
                warn!(topic = %name, "rejected invalid topic name");
                continue;
            }
            match self.logs.create(name).await {
                Ok(()) => {
                    state.topics.insert(name.clone(), Vec::new());
                    created += 1;
                    debug!(topic = %name, "created topic");
                }
                Err(e) => {
                    warn!(topic = %name, error = %e, "failed to persist new topic");
                }
            }
        }
        created
    }

    /// Returns the names of all existing topics (snapshot at call time).
    pub async fn topic_list(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.topics.keys().cloned().collect()
    }

    /// Appends a payload to a topic.
    ///
    /// `false` if the topic is unknown or the append could not be
    /// persisted. The in-memory sequence is extended only after the disk
    /// write succeeds, so memory never runs ahead of disk.
    pub async fn send(&self, topic: &str, payload: Bytes) -> bool {
        let mut state = self.state.lock().await;
        if !state.topics.contains_key(topic) {
            return false;
        }

        match self.logs.append(topic, &payload).await {
            Ok(()) => {
                let messages = state
                    .topics
                    .get_mut(topic)
                    .expect("topic presence checked above");
                messages.push(payload);
                true
            }
            Err(e) => {
                warn!(topic, error = %e, "failed to persist message");
                false
            }
        }
    }

    /// Reads the message at `offset` in `topic`.
    ///
    /// `None` if the topic is unknown or the offset is at or past the end.
    /// A pure point read; no cursor is affected.
    pub async fn get(&self, topic: &str, offset: Offset) -> Option<Bytes> {
        let state = self.state.lock().await;
        let messages = state.topics.get(topic)?;
        messages.get(usize::try_from(offset.get()).ok()?).cloned()
    }

    /// Returns the current length of each named topic, omitting unknown
    /// topics.
    pub async fn end_offsets(&self, names: &[String]) -> Vec<TopicOffset> {
        let state = self.state.lock().await;
        names
            .iter()
            .filter_map(|name| {
                state
                    .topics
                    .get(name)
                    .map(|messages| TopicOffset::new(name.clone(), Offset::new(messages.len() as u64)))
            })
            .collect()
    }

    /// Returns, per topic, all messages from the given cursor to the
    /// current end.
    ///
    /// Unknown topics are omitted; a cursor at or past the end yields an
    /// empty list for that topic. Stateless with respect to the broker.
    pub async fn poll(&self, cursors: &[TopicOffset]) -> HashMap<String, Vec<Bytes>> {
        let state = self.state.lock().await;
        let mut unread = HashMap::new();
        for cursor in cursors {
            let Some(messages) = state.topics.get(&cursor.topic) else {
                continue;
            };
            let from = usize::try_from(cursor.offset.get())
                .unwrap_or(usize::MAX)
                .min(messages.len());
            unread.insert(cursor.topic.clone(), messages[from..].to_vec());
        }
        unread
    }

    /// Durably saves the given cursors for `client`, returning how many
    /// were persisted.
    ///
    /// Cursors for unknown topics are skipped. A cursor whose save fails
    /// is not counted and does not update the in-memory table, so the
    /// cached view never claims more than disk holds.
    pub async fn commit(&self, client: &str, cursors: &[TopicOffset]) -> u64 {
        let mut state = self.state.lock().await;
        let mut saved = 0;
        for cursor in cursors {
            if !state.topics.contains_key(&cursor.topic) {
                continue;
            }
            match self.commits.save(client, &cursor.topic, cursor.offset).await {
                Ok(()) => {
                    state
                        .client_offsets
                        .entry(client.to_string())
                        .or_default()
                        .insert(cursor.topic.clone(), cursor.offset);
                    saved += 1;
                }
                Err(e) => {
                    warn!(client, topic = %cursor.topic, error = %e, "failed to persist committed offset");
                }
            }
        }
        saved
    }

    /// Returns the saved cursor for each named topic that has one.
    ///
    /// The in-memory table is consulted first; on a miss the commit store
    /// is read and a hit is cached. Topics with no saved value anywhere
    /// are omitted.
    pub async fn committed(&self, client: &str, names: &[String]) -> Vec<TopicOffset> {
        let mut state = self.state.lock().await;
        let mut result = Vec::new();
        for name in names {
            if let Some(offset) = state
                .client_offsets
                .get(client)
                .and_then(|topics| topics.get(name))
            {
                result.push(TopicOffset::new(name.clone(), *offset));
                continue;
            }

            match self.commits.load(client, name).await {
                Ok(Some(offset)) => {
                    state
                        .client_offsets
                        .entry(client.to_string())
                        .or_default()
                        .insert(name.clone(), offset);
                    result.push(TopicOffset::new(name.clone(), offset));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(client, topic = %name, error = %e, "failed to load committed offset");
                }
            }
        }
        result
    }
}

#[async_trait]
impl<S: Storage, C: CommitStore> BrokerApi for Broker<S, C> {
    async fn create_topics(&self, names: Vec<String>) -> ApiResult<u64> {
        Ok(Self::create_topics(self, &names).await)
    }

    async fn topic_list(&self) -> ApiResult<Vec<String>> {
        Ok(Self::topic_list(self).await)
    }

    async fn send(&self, topic: String, payload: Bytes) -> ApiResult<bool> {
        Ok(Self::send(self, &topic, payload).await)
    }

    async fn get(&self, topic: String, offset: u64) -> ApiResult<Option<Bytes>> {
        Ok(Self::get(self, &topic, Offset::new(offset)).await)
    }

    async fn end_offsets(&self, names: Vec<String>) -> ApiResult<Vec<TopicOffset>> {
        Ok(Self::end_offsets(self, &names).await)
    }

    async fn poll(&self, cursors: Vec<TopicOffset>) -> ApiResult<HashMap<String, Vec<Bytes>>> {
        Ok(Self::poll(self, &cursors).await)
    }

    async fn commit(&self, client: String, cursors: Vec<TopicOffset>) -> ApiResult<u64> {
        Ok(Self::commit(self, &client, &cursors).await)
    }

    async fn committed(&self, client: String, names: Vec<String>) -> ApiResult<Vec<TopicOffset>> {
        Ok(Self::committed(self, &client, &names).await)
    }
}
