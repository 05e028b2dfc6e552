//! Access layer errors.
//!
//! None of these reach a guard: the evaluator collapses every error into a
//! denied or pending grant and logs it.

use std::time::Duration;
use thiserror::Error;
use vellum_common_http::HttpError;

/// Errors raised while evaluating access.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("permission fetch failed: {0}")]
    FetchFailure(#[from] SourceError),

    #[error("permission fetch timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    #[error("no authenticated identity")]
    IdentityMissing,

    #[error("malformed element path '{path}': {reason}")]
    MalformedElementPath { path: String, reason: String },

    #[error("malformed action: {reason}")]
    MalformedAction { reason: String },
}

/// Errors raised by a permission source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[from] HttpError),

    #[error("backend rejected request: {message}")]
    Backend { message: String },

    #[error("invalid policy: {0}")]
    Policy(#[from] serde_yaml::Error),

    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let timeout = AccessError::Timeout {
            after: Duration::from_millis(250),
        };
        assert_eq!(timeout.to_string(), "permission fetch timed out after 250ms");

        let malformed = AccessError::MalformedElementPath {
            path: "a::b".to_string(),
            reason: "empty segment".to_string(),
        };
        assert!(malformed.to_string().contains("a::b"));

        let fetch: AccessError = SourceError::Backend {
            message: "rpc missing".to_string(),
        }
        .into();
        assert!(fetch.to_string().contains("rpc missing"));
    }
}
