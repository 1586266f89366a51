//! RPC server: accepts connections and dispatches requests to a broker.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use kaska_core::{ApiError, ApiResult, BrokerApi};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::codec::{self, Request, Response, MESSAGE_SIZE_MAX};

/// A TCP server exposing a broker over the framed binary protocol.
///
/// Each accepted connection gets its own task that reads requests, invokes
/// the broker, and writes responses, until the peer disconnects or violates
/// the protocol.
pub struct RpcServer {
    /// The bound listener.
    listener: TcpListener,
}

impl RpcServer {
    /// Binds a listener on `addr`.
    ///
    /// # Errors
    /// Returns [`ApiError::Connection`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr) -> ApiResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(ApiError::connection)?;
        Ok(Self { listener })
    }

    /// Returns the address the server is listening on.
    ///
    /// Useful when bound to port 0.
    ///
    /// # Errors
    /// Returns [`ApiError::Connection`] if the local address is unavailable.
    pub fn local_addr(&self) -> ApiResult<SocketAddr> {
        self.listener.local_addr().map_err(ApiError::connection)
    }

    /// Serves connections forever, dispatching every request to `broker`.
    ///
    /// Accept failures are logged and the loop continues; only the caller
    /// dropping the future stops the server, so `Ok` is never returned.
    ///
    /// # Errors
    /// Never returns an error; the signature keeps call sites uniform.
    pub async fn serve(self, broker: Arc<dyn BrokerApi>) -> ApiResult<()> {
        info!("broker server accepting connections");
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "client connected");
                    let broker = Arc::clone(&broker);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, broker.as_ref()).await {
                            warn!(%peer, error = %e, "connection closed with error");
                        } else {
                            debug!(%peer, "client disconnected");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                }
            }
        }
    }
}

/// Reads framed requests from one connection until EOF, answering each.
async fn handle_connection(mut stream: TcpStream, broker: &dyn BrokerApi) -> ApiResult<()> {
    loop {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(ApiError::connection_lost(e)),
        }

        let len = u32::from_le_bytes(len_buf);
        if len > MESSAGE_SIZE_MAX {
            return Err(ApiError::protocol(format!(
                "oversized frame: {len} bytes"
            )));
        }

        let mut body = vec![0u8; len as usize];
        stream
            .read_exact(&mut body)
            .await
            .map_err(ApiError::connection_lost)?;

        let request = codec::decode_request(Bytes::from(body)).map_err(ApiError::protocol)?;
        let response = match dispatch(broker, request).await {
            Ok(response) => response,
            Err(e) => {
                // The in-process broker never fails a call; if it somehow
                // does, drop the connection rather than invent a response.
                error!(error = %e, "broker call failed, closing connection");
                return Err(e);
            }
        };

        let frame = codec::encode_response(&response).map_err(ApiError::protocol)?;
        stream
            .write_all(&frame)
            .await
            .map_err(ApiError::connection_lost)?;
    }
}

/// Maps one decoded request to the corresponding broker operation.
async fn dispatch(broker: &dyn BrokerApi, request: Request) -> ApiResult<Response> {
    match request {
        Request::CreateTopics { names } => {
            let count = broker.create_topics(names).await?;
            Ok(Response::Created { count })
        }
        Request::TopicList => {
            let names = broker.topic_list().await?;
            Ok(Response::Topics { names })
        }
        Request::Send { topic, payload } => {
            let ok = broker.send(topic, payload).await?;
            Ok(Response::Sent { ok })
        }
        Request::Get { topic, offset } => {
            let payload = broker.get(topic, offset).await?;
            Ok(Response::Message { payload })
        }
        Request::EndOffsets { names } => {
            let offsets = broker.end_offsets(names).await?;
            Ok(Response::EndOffsets { offsets })
        }
        Request::Poll { cursors } => {
            let unread = broker.poll(cursors).await?;
            Ok(Response::Polled {
                unread: unread.into_iter().collect(),
            })
        }
        Request::Commit { client, cursors } => {
            let count = broker.commit(client, cursors).await?;
            Ok(Response::Committed { count })
        }
        Request::Committed { client, names } => {
            let offsets = broker.committed(client, names).await?;
            Ok(Response::CommittedOffsets { offsets })
        }
    }
}
