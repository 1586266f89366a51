//! Kaska Core - shared types and the broker API contract.
//!
//! This crate provides the types shared between the broker and its clients:
//! offsets, topic/offset pairs, delivered records, name validation, and the
//! [`BrokerApi`] trait that every transport must expose verbatim.
//!
//! # Design Principles
//!
//! - **Explicit types**: `Offset` is a newtype, not a bare integer
//! - **In-band absence**: "topic unknown" is `false`/`None`/omission, never
//!   an error - [`ApiError`] is reserved for transport failures
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod api;
mod record;
mod types;

pub mod limits;

pub use api::{ApiError, ApiResult, BrokerApi};
pub use record::Record;
pub use types::{is_valid_name, Offset, TopicOffset};
