//! The consumer session.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use kaska_core::{BrokerApi, Offset, Record, TopicOffset};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

/// A stateful consumer session against one broker.
///
/// The session owns its subscription set exclusively: a map from topic name
/// to the next offset to read. Cursor-mutating methods take `&mut self`, so
/// a session shared between tasks must be externally serialized.
pub struct Client {
    /// The broker, remote or in-process.
    broker: Arc<dyn BrokerApi>,
    /// Identifier under which commits are saved.
    client_id: String,
    /// Topic name to next-offset-to-read. Wholly replaced by `subscribe`.
    subscriptions: HashMap<String, Offset>,
}

impl Client {
    /// Creates a session over an already-connected broker API.
    #[must_use]
    pub fn new(broker: Arc<dyn BrokerApi>, client_id: impl Into<String>) -> Self {
        Self {
            broker,
            client_id: client_id.into(),
            subscriptions: HashMap::new(),
        }
    }

    /// Connects to a remote broker at `addr` (`host:port`).
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn connect(addr: &str, client_id: impl Into<String>) -> ClientResult<Self> {
        let rpc = kaska_rpc::RpcClient::connect(addr).await?;
        Ok(Self::new(Arc::new(rpc), client_id))
    }

    /// Returns the identifier under which this session commits.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    // -------------------------------------------------------------------------
    // Topic management
    // -------------------------------------------------------------------------

    /// Creates the named topics, returning how many were newly created.
    ///
    /// Duplicates in the input are removed before the call.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn create_topics(&self, names: &[String]) -> ClientResult<u64> {
        Ok(self.broker.create_topics(dedup(names)).await?)
    }

    /// Creates a single topic, returning true if it was newly created.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn create_one_topic(&self, topic: &str) -> ClientResult<bool> {
        Ok(self.create_topics(&[topic.to_string()]).await? == 1)
    }

    /// Returns the names of all existing topics.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn topic_list(&self) -> ClientResult<Vec<String>> {
        Ok(self.broker.topic_list().await?)
    }

    // -------------------------------------------------------------------------
    // Producing and point reads
    // -------------------------------------------------------------------------

    /// Serializes `value` and sends it to a topic.
    ///
    /// Returns `false` if the value cannot be serialized, the topic is
    /// unknown, or the broker could not persist the message.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn send<T: Serialize + ?Sized>(&self, topic: &str, value: &T) -> ClientResult<bool> {
        match serde_json::to_vec(value) {
            Ok(encoded) => self.send_bytes(topic, Bytes::from(encoded)).await,
            Err(e) => {
                warn!(topic, error = %e, "value not serializable");
                Ok(false)
            }
        }
    }

    /// Sends a raw payload to a topic.
    ///
    /// Returns `false` if the topic is unknown or the broker could not
    /// persist the message.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn send_bytes(&self, topic: &str, payload: Bytes) -> ClientResult<bool> {
        Ok(self.broker.send(topic.to_string(), payload).await?)
    }

    /// Reads one message by offset, without touching any cursor.
    ///
    /// `None` if the topic is unknown or the offset is at or past the end.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn get(&self, topic: &str, offset: Offset) -> ClientResult<Option<Record>> {
        let payload = self.broker.get(topic.to_string(), offset.get()).await?;
        Ok(payload.map(|payload| Record::new(topic, offset, payload)))
    }

    // -------------------------------------------------------------------------
    // Subscriptions and cursors
    // -------------------------------------------------------------------------

    /// Subscribes to the named topics, returning how many took effect.
    ///
    /// The subscription set is wholly **replaced**: topics absent from
    /// `names` lose their cursor, and each subscribed topic starts at its
    /// current end offset - a new consumer sees only messages sent after
    /// subscribing, unless [`Client::committed`] is used to pull a saved
    /// cursor. Unknown topics are omitted.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn subscribe(&mut self, names: &[String]) -> ClientResult<u64> {
        let ends = self.broker.end_offsets(dedup(names)).await?;
        self.subscriptions = ends
            .into_iter()
            .map(|pair| (pair.topic, pair.offset))
            .collect();
        debug!(topics = self.subscriptions.len(), "replaced subscriptions");
        Ok(self.subscriptions.len() as u64)
    }

    /// Subscribes to a single topic, returning true if it took effect.
    ///
    /// Like [`Client::subscribe`], this replaces the whole subscription set.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn subscribe_one_topic(&mut self, topic: &str) -> ClientResult<bool> {
        Ok(self.subscribe(&[topic.to_string()]).await? == 1)
    }

    /// Drops all subscriptions.
    pub fn unsubscribe(&mut self) {
        self.subscriptions.clear();
    }

    /// Returns the local cursor for a topic, or `None` if not subscribed.
    #[must_use]
    pub fn position(&self, topic: &str) -> Option<Offset> {
        self.subscriptions.get(topic).copied()
    }

    /// Overwrites the local cursor for a subscribed topic.
    ///
    /// Returns `false` if the topic is not currently subscribed.
    pub fn seek(&mut self, topic: &str, offset: Offset) -> bool {
        match self.subscriptions.get_mut(topic) {
            Some(cursor) => {
                *cursor = offset;
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Polling
    // -------------------------------------------------------------------------

    /// Fetches all unread messages for the subscribed topics.
    ///
    /// Each delivered record is tagged with the cursor value before the
    /// increment; the local cursor then advances by one per message,
    /// strictly sequentially per topic.
    ///
    /// # Errors
    /// Returns [`ClientError::NoSubscriptions`] if the subscription set is
    /// empty, or a transport error if the broker cannot be reached.
    pub async fn poll(&mut self) -> ClientResult<Vec<Record>> {
        if self.subscriptions.is_empty() {
            return Err(ClientError::NoSubscriptions);
        }

        let cursors: Vec<TopicOffset> = self
            .subscriptions
            .iter()
            .map(|(topic, offset)| TopicOffset::new(topic.clone(), *offset))
            .collect();
        let unread = self.broker.poll(cursors).await?;

        let mut records = Vec::new();
        for (topic, messages) in unread {
            let Some(cursor) = self.subscriptions.get_mut(&topic) else {
                continue;
            };
            for payload in messages {
                records.push(Record::new(topic.clone(), *cursor, payload));
                *cursor = cursor.next();
            }
        }
        Ok(records)
    }

    // -------------------------------------------------------------------------
    // Commit and recovery
    // -------------------------------------------------------------------------

    /// Durably saves the cursors of all subscribed topics.
    ///
    /// Returns true if every cursor was persisted.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn commit(&self) -> ClientResult<bool> {
        let cursors: Vec<TopicOffset> = self
            .subscriptions
            .iter()
            .map(|(topic, offset)| TopicOffset::new(topic.clone(), *offset))
            .collect();
        let expected = cursors.len() as u64;
        let saved = self.broker.commit(self.client_id.clone(), cursors).await?;
        Ok(saved == expected)
    }

    /// Moves the local cursor of one subscribed topic to `offset` and
    /// durably saves it.
    ///
    /// Returns `false` if the topic is not subscribed or the save did not
    /// take effect.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn commit_offset(&mut self, topic: &str, offset: Offset) -> ClientResult<bool> {
        if !self.seek(topic, offset) {
            return Ok(false);
        }
        let cursors = vec![TopicOffset::new(topic.to_string(), offset)];
        let saved = self.broker.commit(self.client_id.clone(), cursors).await?;
        Ok(saved == 1)
    }

    /// Overwrites the local cursors of all subscribed topics with their
    /// saved values.
    ///
    /// Topics with no saved value keep their current cursor. Returns true
    /// if every subscribed topic had a saved value.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn committed(&mut self) -> ClientResult<bool> {
        let names: Vec<String> = self.subscriptions.keys().cloned().collect();
        let expected = names.len();
        let saved = self
            .broker
            .committed(self.client_id.clone(), names)
            .await?;

        let found = saved.len();
        for pair in saved {
            if let Some(cursor) = self.subscriptions.get_mut(&pair.topic) {
                *cursor = pair.offset;
            }
        }
        Ok(found == expected)
    }

    /// Overwrites the local cursor of one subscribed topic with its saved
    /// value.
    ///
    /// Returns `false` - leaving the cursor untouched - if the topic is not
    /// subscribed or has no saved value.
    ///
    /// # Errors
    /// Returns an error if the broker cannot be reached.
    pub async fn committed_topic(&mut self, topic: &str) -> ClientResult<bool> {
        if !self.subscriptions.contains_key(topic) {
            return Ok(false);
        }
        let saved = self
            .broker
            .committed(self.client_id.clone(), vec![topic.to_string()])
            .await?;

        match saved.into_iter().next() {
            Some(pair) => Ok(self.seek(topic, pair.offset)),
            None => Ok(false),
        }
    }
}

/// Removes duplicates while keeping a deterministic order.
fn dedup(names: &[String]) -> Vec<String> {
    let unique: BTreeSet<&String> = names.iter().collect();
    unique.into_iter().cloned().collect()
}
