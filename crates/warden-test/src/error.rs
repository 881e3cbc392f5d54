//! Test error types.

use thiserror::Error;

/// Errors raised while building a test request.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request could not be assembled.
    #[error("failed to build request: {0}")]
    RequestBuild(String),

    /// A body could not be encoded.
    #[error("failed to encode body: {0}")]
    Encode(String),
}

impl From<http::Error> for TestError {
    fn from(error: http::Error) -> Self {
        Self::RequestBuild(error.to_string())
    }
}
