//! Topic log frame codec.
//!
//! A frame is a 4-byte big-endian length prefix followed by the raw payload
//! bytes. Frames carry no checksum; the only detectable corruption is a
//! length prefix that claims more bytes than remain.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use kaska_core::limits::MESSAGE_SIZE_BYTES_MAX;

use crate::error::{LogError, LogResult};

/// Magic signature identifying a topic log file.
pub const MAGIC: [u8; 4] = *b"KASK";

/// Size of a frame length prefix in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Encodes one message payload as a frame.
///
/// # Errors
/// Returns [`LogError::MessageTooLarge`] if the payload exceeds
/// [`MESSAGE_SIZE_BYTES_MAX`].
pub fn encode_frame(payload: &[u8]) -> LogResult<Bytes> {
    if payload.len() > MESSAGE_SIZE_BYTES_MAX as usize {
        return Err(LogError::MessageTooLarge {
            size: payload.len() as u64,
            max: MESSAGE_SIZE_BYTES_MAX,
        });
    }

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    // Safe cast: length checked against MESSAGE_SIZE_BYTES_MAX above.
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Decodes one frame, advancing `buf` past it.
///
/// `offset` is the frame's byte position within the file, used for error
/// reporting only.
///
/// # Errors
/// Returns [`LogError::TruncatedFrame`] if the buffer ends inside the
/// length prefix or inside the declared payload.
pub fn decode_frame(buf: &mut impl Buf, offset: u64) -> LogResult<Bytes> {
    if buf.remaining() < FRAME_HEADER_SIZE {
        return Err(LogError::TruncatedFrame {
            offset,
            expected: FRAME_HEADER_SIZE as u32,
            #[allow(clippy::cast_possible_truncation)]
            found: buf.remaining() as u32,
        });
    }

    let length = buf.get_u32();
    if buf.remaining() < length as usize {
        return Err(LogError::TruncatedFrame {
            offset,
            expected: length,
            #[allow(clippy::cast_possible_truncation)]
            found: buf.remaining() as u32,
        });
    }

    Ok(buf.copy_to_bytes(length as usize))
}
