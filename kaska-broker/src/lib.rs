//! Kaska Broker - the broker state machine.
//!
//! This crate holds the authoritative in-memory view of all topics and all
//! clients' committed offsets, and persists every state change through the
//! log store and commit store before acknowledging it.
//!
//! # Design Principles
//!
//! - **Whole-object mutual exclusion**: one mutex guards all broker state,
//!   making every public operation a serializable transaction
//! - **Persist before acknowledge**: memory is updated only after the disk
//!   write succeeds, so the in-memory view never runs ahead of disk
//! - **Degrade, don't crash**: persistence failures are logged and reported
//!   as the operation's ordinary failure outcome
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod broker;

pub use broker::Broker;
