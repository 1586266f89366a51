//! Client session error types.

use kaska_core::ApiError;
use thiserror::Error;

/// Result type for client session operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// `poll` was called with an empty subscription set.
    #[error("no subscribed topics")]
    NoSubscriptions,

    /// The broker could not be reached or the call failed in transit.
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_converts() {
        let err: ClientError = ApiError::connection("refused").into();
        assert!(matches!(err, ClientError::Api(_)));
        assert!(format!("{err}").contains("refused"));
    }
}
