//! Kaska RPC - request/response transport for the broker API.
//!
//! This crate carries the eight [`kaska_core::BrokerApi`] operations over
//! TCP using a minimal length-prefixed binary protocol. It adds nothing to
//! the contract: every request maps to one broker operation and every
//! response to its result; application-level absence stays in-band, and
//! only transport failures become errors.
//!
//! # Wire Format
//!
//! Each message is framed as:
//! - 4 bytes: message length (u32 little-endian, not including the prefix)
//! - 1 byte: message type tag
//! - N bytes: message-specific payload
//!
//! Strings are u16-length-prefixed UTF-8; payloads are u32-length-prefixed
//! raw bytes; lists are u32-counted.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod client;
mod codec;
mod server;

pub use client::RpcClient;
pub use codec::{CodecError, CodecResult, Request, Response, MESSAGE_SIZE_MAX};
pub use server::RpcServer;
