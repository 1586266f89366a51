//! Broker configuration limits.
//!
//! Every resource has a bounded maximum, checked explicitly at the point
//! where the bound matters.

/// Maximum size of a single message payload in bytes (1 MiB).
///
/// Bounds the `u32` length prefix of a log frame and of RPC byte fields.
pub const MESSAGE_SIZE_BYTES_MAX: u32 = 1024 * 1024;

/// Maximum length of a topic name or client identifier in bytes.
///
/// Names become file and directory names, so they are held to the common
/// filesystem component limit.
pub const NAME_BYTES_MAX: usize = 255;
