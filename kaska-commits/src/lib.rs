//! Kaska Commits - durable committed-offset storage.
//!
//! This crate persists one committed offset per (client, topic) pair,
//! independently of the topic logs: one directory per client identifier,
//! one file per topic containing the decimal ASCII offset.
//!
//! # Layout
//!
//! ```text
//! <commits-dir>/
//!   consumer-1/
//!     orders      # "42"
//!     invoices    # "7"
//!   consumer-2/
//!     orders      # "40"
//! ```
//!
//! # Design Principles
//!
//! - **Atomic checkpoints**: saves go through a temp file plus rename, so a
//!   crash mid-write cannot leave a torn offset file
//! - **Absence is not an error**: a missing or unparsable file loads as
//!   `None` ("never committed")
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod store;

pub use error::{CommitError, CommitResult};
pub use store::{CommitStore, CommitStoreFaultConfig, FsCommitStore, SimulatedCommitStore};
