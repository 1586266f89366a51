//! RPC client: [`kaska_core::BrokerApi`] over one TCP connection.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use kaska_core::{ApiError, ApiResult, BrokerApi, TopicOffset};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::codec::{
    self, CodecError, Request, Response, MESSAGE_SIZE_MAX,
};

/// A broker client speaking the framed binary protocol.
///
/// Calls are strict request/response over a single connection: the stream
/// is held for the full exchange, so concurrent callers serialize. Every
/// transport or codec failure surfaces as [`ApiError`], keeping it
/// distinguishable from all in-band "not found" outcomes.
pub struct RpcClient {
    /// The connection, guarded so that one call's request/response pair
    /// never interleaves with another's.
    stream: Mutex<TcpStream>,
}

impl RpcClient {
    /// Connects to a broker at `addr` (`host:port`).
    ///
    /// # Errors
    /// Returns [`ApiError::Connection`] if the broker cannot be reached.
    pub async fn connect(addr: &str) -> ApiResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(ApiError::connection)?;
        debug!(addr, "connected to broker");
        Ok(Self {
            stream: Mutex::new(stream),
        })
    }

    /// Sends one request and reads its response.
    async fn call(&self, request: Request) -> ApiResult<Response> {
        let frame = codec::encode_request(&request).map_err(ApiError::protocol)?;

        let mut stream = self.stream.lock().await;
        stream
            .write_all(&frame)
            .await
            .map_err(ApiError::connection_lost)?;

        let mut len_buf = [0u8; 4];
        stream
            .read_exact(&mut len_buf)
            .await
            .map_err(ApiError::connection_lost)?;
        let len = u32::from_le_bytes(len_buf);
        if len > MESSAGE_SIZE_MAX {
            return Err(ApiError::protocol(CodecError::MessageTooLarge {
                size: u64::from(len),
                max: MESSAGE_SIZE_MAX,
            }));
        }

        let mut body = vec![0u8; len as usize];
        stream
            .read_exact(&mut body)
            .await
            .map_err(ApiError::connection_lost)?;
        drop(stream);

        codec::decode_response(Bytes::from(body)).map_err(ApiError::protocol)
    }

    /// Rejects a response of the wrong shape for the request sent.
    fn unexpected<T>(response: &Response) -> ApiResult<T> {
        Err(ApiError::Protocol {
            message: format!("unexpected response: {response:?}"),
        })
    }
}

#[async_trait]
impl BrokerApi for RpcClient {
    async fn create_topics(&self, names: Vec<String>) -> ApiResult<u64> {
        match self.call(Request::CreateTopics { names }).await? {
            Response::Created { count } => Ok(count),
            other => Self::unexpected(&other),
        }
    }

    async fn topic_list(&self) -> ApiResult<Vec<String>> {
        match self.call(Request::TopicList).await? {
            Response::Topics { names } => Ok(names),
            other => Self::unexpected(&other),
        }
    }

    async fn send(&self, topic: String, payload: Bytes) -> ApiResult<bool> {
        match self.call(Request::Send { topic, payload }).await? {
            Response::Sent { ok } => Ok(ok),
            other => Self::unexpected(&other),
        }
    }

    async fn get(&self, topic: String, offset: u64) -> ApiResult<Option<Bytes>> {
        match self.call(Request::Get { topic, offset }).await? {
            Response::Message { payload } => Ok(payload),
            other => Self::unexpected(&other),
        }
    }

    async fn end_offsets(&self, names: Vec<String>) -> ApiResult<Vec<TopicOffset>> {
        match self.call(Request::EndOffsets { names }).await? {
            Response::EndOffsets { offsets } => Ok(offsets),
            other => Self::unexpected(&other),
        }
    }

    async fn poll(&self, cursors: Vec<TopicOffset>) -> ApiResult<HashMap<String, Vec<Bytes>>> {
        match self.call(Request::Poll { cursors }).await? {
            Response::Polled { unread } => Ok(unread.into_iter().collect()),
            other => Self::unexpected(&other),
        }
    }

    async fn commit(&self, client: String, cursors: Vec<TopicOffset>) -> ApiResult<u64> {
        match self.call(Request::Commit { client, cursors }).await? {
            Response::Committed { count } => Ok(count),
            other => Self::unexpected(&other),
        }
    }

    async fn committed(&self, client: String, names: Vec<String>) -> ApiResult<Vec<TopicOffset>> {
        match self.call(Request::Committed { client, names }).await? {
            Response::CommittedOffsets { offsets } => Ok(offsets),
            other => Self::unexpected(&other),
        }
    }
}
