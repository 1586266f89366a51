//! Kaska Tests - integration tests for the Kaska workspace.
//!
//! Cross-crate tests live here; unit tests stay inline in each crate under
//! `#[cfg(test)]`.
//!
//! ## Test Organization
//!
//! - `broker_tests`: broker state-machine properties, including concurrent
//!   producers and fault-injected persistence failures
//! - `session_tests`: client session cursor semantics over an in-process
//!   broker
//! - `recovery_tests`: on-disk layout and restart recovery on a real
//!   filesystem
//! - `rpc_tests`: end-to-end exchanges over a real TCP socket
//!
//! ## Naming Conventions
//!
//! - Integration tests: `test_<component>_<scenario>`

#![forbid(unsafe_code)]

#[cfg(test)]
mod broker_tests;
