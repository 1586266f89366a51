//! Kaska Client - the consumer-facing session API.
//!
//! A [`Client`] presents the broker's offset and poll primitives as a
//! stateful consumer cursor: it tracks one subscription set (topic to
//! next-offset-to-read), turns broker poll results into delivered
//! [`kaska_core::Record`]s, and drives durable commit and recovery of read
//! positions.
//!
//! The session is written against the [`kaska_core::BrokerApi`] trait, so
//! the same code runs over a remote connection or directly against an
//! in-process broker.
//!
//! # Design Principles
//!
//! - **Private cursors**: the broker never sees the subscription set, only
//!   discrete topic/offset arguments per call
//! - **No silent failures**: every public operation returns a definite
//!   success value or an unambiguous non-success value; transport errors
//!   are real errors, never swallowed
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod session;

pub use error::{ClientError, ClientResult};
pub use session::Client;
