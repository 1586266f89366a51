//! Message codec for the broker protocol over TCP.
//!
//! Binary serialization for broker requests and responses using a simple
//! length-prefixed format suitable for TCP streaming.
//!
//! # Message Types
//!
//! Requests:
//! - 0: `CreateTopics`
//! - 1: `TopicList`
//! - 2: `Send`
//! - 3: `Get`
//! - 4: `EndOffsets`
//! - 5: `Poll`
//! - 6: `Commit`
//! - 7: `Committed`
//!
//! Responses carry the same tag as the request they answer.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use kaska_core::{Offset, TopicOffset};
use thiserror::Error;

/// Maximum framed message size (64 MiB).
///
/// A poll response carries every unread message of every polled topic, so
/// the bound is well above the single-message limit.
pub const MESSAGE_SIZE_MAX: u32 = 64 * 1024 * 1024;

/// Message type tags, shared by requests and responses.
const TAG_CREATE_TOPICS: u8 = 0;
const TAG_TOPIC_LIST: u8 = 1;
const TAG_SEND: u8 = 2;
const TAG_GET: u8 = 3;
const TAG_END_OFFSETS: u8 = 4;
const TAG_POLL: u8 = 5;
const TAG_COMMIT: u8 = 6;
const TAG_COMMITTED: u8 = 7;

/// Codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Message exceeds maximum allowed size.
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge {
        /// Actual size.
        size: u64,
        /// Maximum allowed.
        max: u32,
    },

    /// Unknown message type tag.
    #[error("unknown message type: {tag}")]
    UnknownMessageType {
        /// The unknown tag value.
        tag: u8,
    },

    /// Insufficient data to decode a message.
    #[error("insufficient data: need {need} bytes, have {have}")]
    InsufficientData {
        /// Bytes needed.
        need: usize,
        /// Bytes available.
        have: usize,
    },

    /// A string field is not valid UTF-8.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// A broker request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Create the named topics.
    CreateTopics {
        /// Topic names to create.
        names: Vec<String>,
    },
    /// List all topic names.
    TopicList,
    /// Append a payload to a topic.
    Send {
        /// Target topic.
        topic: String,
        /// Message payload.
        payload: Bytes,
    },
    /// Read one message by offset.
    Get {
        /// Topic to read from.
        topic: String,
        /// Offset to read.
        offset: u64,
    },
    /// Fetch current end offsets.
    EndOffsets {
        /// Topic names to query.
        names: Vec<String>,
    },
    /// Fetch unread messages for a set of cursors.
    Poll {
        /// One cursor per subscribed topic.
        cursors: Vec<TopicOffset>,
    },
    /// Durably save cursors for a client.
    Commit {
        /// Client identifier.
        client: String,
        /// Cursors to save.
        cursors: Vec<TopicOffset>,
    },
    /// Fetch saved cursors for a client.
    Committed {
        /// Client identifier.
        client: String,
        /// Topic names to query.
        names: Vec<String>,
    },
}

/// A broker response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Answer to [`Request::CreateTopics`].
    Created {
        /// Number of newly created topics.
        count: u64,
    },
    /// Answer to [`Request::TopicList`].
    Topics {
        /// All topic names.
        names: Vec<String>,
    },
    /// Answer to [`Request::Send`].
    Sent {
        /// Whether the message was accepted and persisted.
        ok: bool,
    },
    /// Answer to [`Request::Get`].
    Message {
        /// The payload, or `None` if topic or offset is unknown.
        payload: Option<Bytes>,
    },
    /// Answer to [`Request::EndOffsets`].
    EndOffsets {
        /// Lengths of the known topics among those queried.
        offsets: Vec<TopicOffset>,
    },
    /// Answer to [`Request::Poll`].
    Polled {
        /// Per topic, the unread messages in offset order.
        unread: Vec<(String, Vec<Bytes>)>,
    },
    /// Answer to [`Request::Commit`].
    Committed {
        /// Number of cursors persisted.
        count: u64,
    },
    /// Answer to [`Request::Committed`].
    CommittedOffsets {
        /// Saved cursors among the topics queried.
        offsets: Vec<TopicOffset>,
    },
}

// -----------------------------------------------------------------------------
// Encoding
// -----------------------------------------------------------------------------

/// Encodes a request as a complete frame (length prefix included).
///
/// # Errors
/// Returns an error if the encoded message exceeds [`MESSAGE_SIZE_MAX`].
pub fn encode_request(request: &Request) -> CodecResult<Bytes> {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_u32_le(0); // Length prefix, filled in below.

    match request {
        Request::CreateTopics { names } => {
            buf.put_u8(TAG_CREATE_TOPICS);
            put_string_list(&mut buf, names);
        }
        Request::TopicList => {
            buf.put_u8(TAG_TOPIC_LIST);
        }
        Request::Send { topic, payload } => {
            buf.put_u8(TAG_SEND);
            put_string(&mut buf, topic);
            put_bytes(&mut buf, payload);
        }
        Request::Get { topic, offset } => {
            buf.put_u8(TAG_GET);
            put_string(&mut buf, topic);
            buf.put_u64_le(*offset);
        }
        Request::EndOffsets { names } => {
            buf.put_u8(TAG_END_OFFSETS);
            put_string_list(&mut buf, names);
        }
        Request::Poll { cursors } => {
            buf.put_u8(TAG_POLL);
            put_topic_offsets(&mut buf, cursors);
        }
        Request::Commit { client, cursors } => {
            buf.put_u8(TAG_COMMIT);
            put_string(&mut buf, client);
            put_topic_offsets(&mut buf, cursors);
        }
        Request::Committed { client, names } => {
            buf.put_u8(TAG_COMMITTED);
            put_string(&mut buf, client);
            put_string_list(&mut buf, names);
        }
    }

    finish_frame(buf)
}

/// Encodes a response as a complete frame (length prefix included).
///
/// # Errors
/// Returns an error if the encoded message exceeds [`MESSAGE_SIZE_MAX`].
pub fn encode_response(response: &Response) -> CodecResult<Bytes> {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_u32_le(0); // Length prefix, filled in below.

    match response {
        Response::Created { count } => {
            buf.put_u8(TAG_CREATE_TOPICS);
            buf.put_u64_le(*count);
        }
        Response::Topics { names } => {
            buf.put_u8(TAG_TOPIC_LIST);
            put_string_list(&mut buf, names);
        }
        Response::Sent { ok } => {
            buf.put_u8(TAG_SEND);
            buf.put_u8(u8::from(*ok));
        }
        Response::Message { payload } => {
            buf.put_u8(TAG_GET);
            match payload {
                Some(payload) => {
                    buf.put_u8(1);
                    put_bytes(&mut buf, payload);
                }
                None => buf.put_u8(0),
            }
        }
        Response::EndOffsets { offsets } => {
            buf.put_u8(TAG_END_OFFSETS);
            put_topic_offsets(&mut buf, offsets);
        }
        Response::Polled { unread } => {
            buf.put_u8(TAG_POLL);
            // Safe cast: list lengths are bounded by MESSAGE_SIZE_MAX.
            #[allow(clippy::cast_possible_truncation)]
            buf.put_u32_le(unread.len() as u32);
            for (topic, messages) in unread {
                put_string(&mut buf, topic);
                #[allow(clippy::cast_possible_truncation)]
                buf.put_u32_le(messages.len() as u32);
                for payload in messages {
                    put_bytes(&mut buf, payload);
                }
            }
        }
        Response::Committed { count } => {
            buf.put_u8(TAG_COMMIT);
            buf.put_u64_le(*count);
        }
        Response::CommittedOffsets { offsets } => {
            buf.put_u8(TAG_COMMITTED);
            put_topic_offsets(&mut buf, offsets);
        }
    }

    finish_frame(buf)
}

/// Fills in the length prefix and checks the size bound.
fn finish_frame(mut buf: BytesMut) -> CodecResult<Bytes> {
    let len = buf.len() - 4;
    if len > MESSAGE_SIZE_MAX as usize {
        return Err(CodecError::MessageTooLarge {
            size: len as u64,
            max: MESSAGE_SIZE_MAX,
        });
    }
    // Safe cast: checked against MESSAGE_SIZE_MAX above.
    #[allow(clippy::cast_possible_truncation)]
    buf[0..4].copy_from_slice(&(len as u32).to_le_bytes());
    Ok(buf.freeze())
}

// -----------------------------------------------------------------------------
// Decoding
// -----------------------------------------------------------------------------

/// Decodes a request from a frame body (length prefix already stripped).
///
/// # Errors
/// Returns an error if the data is malformed or incomplete.
pub fn decode_request(mut frame: Bytes) -> CodecResult<Request> {
    let tag = get_u8(&mut frame)?;
    match tag {
        TAG_CREATE_TOPICS => Ok(Request::CreateTopics {
            names: get_string_list(&mut frame)?,
        }),
        TAG_TOPIC_LIST => Ok(Request::TopicList),
        TAG_SEND => Ok(Request::Send {
            topic: get_string(&mut frame)?,
            payload: get_bytes(&mut frame)?,
        }),
        TAG_GET => Ok(Request::Get {
            topic: get_string(&mut frame)?,
            offset: get_u64(&mut frame)?,
        }),
        TAG_END_OFFSETS => Ok(Request::EndOffsets {
            names: get_string_list(&mut frame)?,
        }),
        TAG_POLL => Ok(Request::Poll {
            cursors: get_topic_offsets(&mut frame)?,
        }),
        TAG_COMMIT => Ok(Request::Commit {
            client: get_string(&mut frame)?,
            cursors: get_topic_offsets(&mut frame)?,
        }),
        TAG_COMMITTED => Ok(Request::Committed {
            client: get_string(&mut frame)?,
            names: get_string_list(&mut frame)?,
        }),
        tag => Err(CodecError::UnknownMessageType { tag }),
    }
}

/// Decodes a response from a frame body (length prefix already stripped).
///
/// # Errors
/// Returns an error if the data is malformed or incomplete.
pub fn decode_response(mut frame: Bytes) -> CodecResult<Response> {
    let tag = get_u8(&mut frame)?;
    match tag {
        TAG_CREATE_TOPICS => Ok(Response::Created {
            count: get_u64(&mut frame)?,
        }),
        TAG_TOPIC_LIST => Ok(Response::Topics {
            names: get_string_list(&mut frame)?,
        }),
        TAG_SEND => Ok(Response::Sent {
            ok: get_u8(&mut frame)? != 0,
        }),
        TAG_GET => {
            let present = get_u8(&mut frame)? != 0;
            let payload = if present {
                Some(get_bytes(&mut frame)?)
            } else {
                None
            };
            Ok(Response::Message { payload })
        }
        TAG_END_OFFSETS => Ok(Response::EndOffsets {
            offsets: get_topic_offsets(&mut frame)?,
        }),
        TAG_POLL => {
            let count = get_u32(&mut frame)? as usize;
            let mut unread = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                let topic = get_string(&mut frame)?;
                let message_count = get_u32(&mut frame)? as usize;
                let mut messages = Vec::with_capacity(message_count.min(1024));
                for _ in 0..message_count {
                    messages.push(get_bytes(&mut frame)?);
                }
                unread.push((topic, messages));
            }
            Ok(Response::Polled { unread })
        }
        TAG_COMMIT => Ok(Response::Committed {
            count: get_u64(&mut frame)?,
        }),
        TAG_COMMITTED => Ok(Response::CommittedOffsets {
            offsets: get_topic_offsets(&mut frame)?,
        }),
        tag => Err(CodecError::UnknownMessageType { tag }),
    }
}

// -----------------------------------------------------------------------------
// Field helpers
// -----------------------------------------------------------------------------
// Every read checks `remaining()` first so malformed input yields
// `InsufficientData` instead of a panic.

fn put_string(buf: &mut BytesMut, value: &str) {
    // Safe cast: names are bounded well below u16::MAX.
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u16_le(value.len() as u16);
    buf.put_slice(value.as_bytes());
}

fn get_string(buf: &mut Bytes) -> CodecResult<String> {
    let len = get_u16(buf)? as usize;
    if buf.remaining() < len {
        return Err(CodecError::InsufficientData {
            need: len,
            have: buf.remaining(),
        });
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}

fn put_bytes(buf: &mut BytesMut, value: &Bytes) {
    // Safe cast: payloads are bounded by MESSAGE_SIZE_MAX.
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u32_le(value.len() as u32);
    buf.put_slice(value);
}

fn get_bytes(buf: &mut Bytes) -> CodecResult<Bytes> {
    let len = get_u32(buf)? as usize;
    if buf.remaining() < len {
        return Err(CodecError::InsufficientData {
            need: len,
            have: buf.remaining(),
        });
    }
    Ok(buf.copy_to_bytes(len))
}

fn put_string_list(buf: &mut BytesMut, values: &[String]) {
    // Safe cast: list lengths are bounded by MESSAGE_SIZE_MAX.
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u32_le(values.len() as u32);
    for value in values {
        put_string(buf, value);
    }
}

fn get_string_list(buf: &mut Bytes) -> CodecResult<Vec<String>> {
    let count = get_u32(buf)? as usize;
    let mut values = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        values.push(get_string(buf)?);
    }
    Ok(values)
}

fn put_topic_offsets(buf: &mut BytesMut, values: &[TopicOffset]) {
    // Safe cast: list lengths are bounded by MESSAGE_SIZE_MAX.
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u32_le(values.len() as u32);
    for value in values {
        put_string(buf, &value.topic);
        buf.put_u64_le(value.offset.get());
    }
}

fn get_topic_offsets(buf: &mut Bytes) -> CodecResult<Vec<TopicOffset>> {
    let count = get_u32(buf)? as usize;
    let mut values = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let topic = get_string(buf)?;
        let offset = get_u64(buf)?;
        values.push(TopicOffset::new(topic, Offset::new(offset)));
    }
    Ok(values)
}

fn get_u8(buf: &mut Bytes) -> CodecResult<u8> {
    if buf.remaining() < 1 {
        return Err(CodecError::InsufficientData {
            need: 1,
            have: buf.remaining(),
        });
    }
    Ok(buf.get_u8())
}

fn get_u16(buf: &mut Bytes) -> CodecResult<u16> {
    if buf.remaining() < 2 {
        return Err(CodecError::InsufficientData {
            need: 2,
            have: buf.remaining(),
        });
    }
    Ok(buf.get_u16_le())
}

fn get_u32(buf: &mut Bytes) -> CodecResult<u32> {
    if buf.remaining() < 4 {
        return Err(CodecError::InsufficientData {
            need: 4,
            have: buf.remaining(),
        });
    }
    Ok(buf.get_u32_le())
}

fn get_u64(buf: &mut Bytes) -> CodecResult<u64> {
    if buf.remaining() < 8 {
        return Err(CodecError::InsufficientData {
            need: 8,
            have: buf.remaining(),
        });
    }
    Ok(buf.get_u64_le())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_prefix(frame: Bytes) -> Bytes {
        frame.slice(4..)
    }

    #[test]
    fn test_commit_request_roundtrip() {
        let request = Request::Commit {
            client: "consumer-1".to_string(),
            cursors: vec![
                TopicOffset::new("orders", Offset::new(5)),
                TopicOffset::new("invoices", Offset::new(0)),
            ],
        };
        let frame = encode_request(&request).unwrap();
        let decoded = decode_request(strip_prefix(frame)).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_polled_response_roundtrip() {
        let response = Response::Polled {
            unread: vec![
                (
                    "orders".to_string(),
                    vec![Bytes::from("a"), Bytes::from(""), Bytes::from("c")],
                ),
                ("empty".to_string(), vec![]),
            ],
        };
        let frame = encode_response(&response).unwrap();
        let decoded = decode_response(strip_prefix(frame)).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_get_response_absent_roundtrip() {
        let response = Response::Message { payload: None };
        let frame = encode_response(&response).unwrap();
        let decoded = decode_response(strip_prefix(frame)).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_length_prefix_counts_body_only() {
        let frame = encode_request(&Request::TopicList).unwrap();
        let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        assert_eq!(len as usize, frame.len() - 4);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let result = decode_request(Bytes::from_static(&[0xFF]));
        assert!(matches!(
            result,
            Err(CodecError::UnknownMessageType { tag: 0xFF })
        ));
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let request = Request::Send {
            topic: "orders".to_string(),
            payload: Bytes::from("payload"),
        };
        let frame = strip_prefix(encode_request(&request).unwrap());
        let truncated = frame.slice(..frame.len() - 3);
        let result = decode_request(truncated);
        assert!(matches!(result, Err(CodecError::InsufficientData { .. })));
    }
}
