//! Kaska Log - durable topic log storage.
//!
//! This crate persists each topic's message sequence as a single append-only
//! file and reconstructs all topics from disk at startup.
//!
//! # File Format
//!
//! ```text
//! +-----------+-----------+-----------+-----
//! | MAGIC (4) |  frame 1  |  frame 2  | ...
//! +-----------+-----------+-----------+-----
//! ```
//!
//! Each frame is a 4-byte big-endian length prefix followed by that many
//! raw payload bytes. There is no checksum and no frame boundary recovery:
//! a truncated trailing frame makes the file unreadable from that point.
//!
//! # Design Principles
//!
//! - **Durability boundary**: every append is followed by an fsync before
//!   the call returns
//! - **Tolerant recovery**: the startup scan skips stray and corrupt files
//!   instead of failing
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod frame;
mod storage;
mod store;

pub use error::{LogError, LogResult};
pub use frame::{FRAME_HEADER_SIZE, MAGIC};
pub use storage::{FaultConfig, SimulatedStorage, Storage, StorageFile, TokioStorage};
pub use store::TopicLogStore;
