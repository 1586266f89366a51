//! Commit store error types.

use thiserror::Error;

/// Result type for commit store operations.
pub type CommitResult<T> = Result<T, CommitError>;

/// Errors that can occur during commit store operations.
#[derive(Debug, Error)]
pub enum CommitError {
    /// A client identifier or topic name cannot be used as a path component.
    #[error("invalid name: {name:?}")]
    InvalidName {
        /// The offending name.
        name: String,
    },

    /// I/O error from the filesystem.
    #[error("I/O error: {operation}: {message}")]
    Io {
        /// What operation was being performed.
        operation: &'static str,
        /// Error message.
        message: String,
    },
}

impl CommitError {
    /// Creates an I/O error.
    pub fn io(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Io {
            operation,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommitError::InvalidName {
            name: "../escape".to_string(),
        };
        assert!(format!("{err}").contains("../escape"));
    }
}
