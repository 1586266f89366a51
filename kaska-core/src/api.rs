//! The broker API contract.
//!
//! [`BrokerApi`] names the eight operations a broker exposes. The in-process
//! broker implements it directly; a remote client implements it by carrying
//! each call over a transport. Application-level absence ("topic unknown",
//! "never committed") is always in-band - `false`, `None`, or omission from
//! a result set - so [`ApiError`] can mean exactly one thing: the call
//! itself could not be carried out.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::TopicOffset;

/// Result type for broker API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Transport-level failure of a broker API call.
///
/// Lets a caller tell "topic doesn't exist" (in-band) apart from "broker
/// unreachable" (this error).
#[derive(Debug, Error)]
pub enum ApiError {
    /// The broker could not be reached.
    #[error("connection failed: {message}")]
    Connection {
        /// Description of the underlying failure.
        message: String,
    },

    /// The connection dropped while a call was in flight.
    #[error("connection lost: {message}")]
    ConnectionLost {
        /// Description of the underlying failure.
        message: String,
    },

    /// The peer violated the wire protocol.
    #[error("protocol violation: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },
}

impl ApiError {
    /// Creates a connection-failure error.
    pub fn connection(err: impl std::fmt::Display) -> Self {
        Self::Connection {
            message: err.to_string(),
        }
    }

    /// Creates a connection-lost error.
    pub fn connection_lost(err: impl std::fmt::Display) -> Self {
        Self::ConnectionLost {
            message: err.to_string(),
        }
    }

    /// Creates a protocol-violation error.
    pub fn protocol(err: impl std::fmt::Display) -> Self {
        Self::Protocol {
            message: err.to_string(),
        }
    }
}

/// The broker's remote operations.
///
/// Every operation is synchronous request/response and atomic with respect
/// to the broker's full state. Returned collections are independent copies;
/// no call hands out a reference into broker internals.
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// Creates the named topics, returning how many were newly created.
    ///
    /// Pre-existing topics are no-ops; each new topic is persisted empty
    /// before it is counted.
    ///
    /// # Errors
    /// Returns an error only if the call could not reach the broker.
    async fn create_topics(&self, names: Vec<String>) -> ApiResult<u64>;

    /// Returns the names of all existing topics (snapshot at call time).
    ///
    /// # Errors
    /// Returns an error only if the call could not reach the broker.
    async fn topic_list(&self) -> ApiResult<Vec<String>>;

    /// Appends a payload to a topic.
    ///
    /// Returns `false` if the topic is unknown or the message could not be
    /// durably persisted; on `true` the payload is the topic's new last
    /// message and is on disk.
    ///
    /// # Errors
    /// Returns an error only if the call could not reach the broker.
    async fn send(&self, topic: String, payload: Bytes) -> ApiResult<bool>;

    /// Reads the message at `offset` in `topic`.
    ///
    /// `None` if the topic is unknown or the offset is at or past the end.
    /// A pure point read; no cursor is affected.
    ///
    /// # Errors
    /// Returns an error only if the call could not reach the broker.
    async fn get(&self, topic: String, offset: u64) -> ApiResult<Option<Bytes>>;

    /// Returns the current length of each named topic.
    ///
    /// Unknown topics are silently omitted from the result.
    ///
    /// # Errors
    /// Returns an error only if the call could not reach the broker.
    async fn end_offsets(&self, names: Vec<String>) -> ApiResult<Vec<TopicOffset>>;

    /// Returns, per topic, all messages from the given cursor to the
    /// current end.
    ///
    /// Unknown topics are omitted. The call is stateless with respect to
    /// the broker: nothing advances server-side.
    ///
    /// # Errors
    /// Returns an error only if the call could not reach the broker.
    async fn poll(&self, cursors: Vec<TopicOffset>) -> ApiResult<HashMap<String, Vec<Bytes>>>;

    /// Durably saves the given cursors for `client`, returning how many
    /// were persisted.
    ///
    /// Cursors for unknown topics are skipped and not counted.
    ///
    /// # Errors
    /// Returns an error only if the call could not reach the broker.
    async fn commit(&self, client: String, cursors: Vec<TopicOffset>) -> ApiResult<u64>;

    /// Returns the saved cursor for each named topic that has one.
    ///
    /// Topics with no saved value are omitted, not errored.
    ///
    /// # Errors
    /// Returns an error only if the call could not reach the broker.
    async fn committed(&self, client: String, names: Vec<String>) -> ApiResult<Vec<TopicOffset>>;
}
