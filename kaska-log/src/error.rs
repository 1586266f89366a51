//! Log store error types.
//!
//! All errors are explicit and typed. No string errors.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for log store operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur during log store operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// The file does not start with the topic log magic signature.
    #[error("bad magic in {path}: not a topic log")]
    BadMagic {
        /// Path of the offending file.
        path: PathBuf,
    },

    /// A frame length prefix claims more bytes than remain in the file.
    #[error("truncated frame at offset {offset}: expected {expected} bytes, found {found}")]
    TruncatedFrame {
        /// Byte offset of the frame within the file.
        offset: u64,
        /// Bytes the frame claimed.
        expected: u32,
        /// Bytes actually remaining.
        found: u32,
    },

    /// Message payload exceeds the maximum frame size.
    #[error("message too large: {size} bytes exceeds max {max} bytes")]
    MessageTooLarge {
        /// Actual payload size in bytes.
        size: u64,
        /// Maximum allowed size.
        max: u32,
    },

    /// I/O error from the underlying storage.
    #[error("I/O error: {operation}: {message}")]
    Io {
        /// What operation was being performed.
        operation: &'static str,
        /// Error message.
        message: String,
    },
}

impl LogError {
    /// Creates an I/O error.
    pub fn io(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Io {
            operation,
            message: err.to_string(),
        }
    }

    /// Returns true if this error indicates a corrupt log file.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::BadMagic { .. } | Self::TruncatedFrame { .. })
    }
}
