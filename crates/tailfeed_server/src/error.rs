//! Error types for the change-feed server.

use tailfeed_protocol::{ProtocolError, Timestamp};
use thiserror::Error;

/// Result type for server operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Result type for log store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a log store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached or failed the operation.
    #[error("log store unavailable: {0}")]
    Unavailable(String),

    /// An append would break timestamp order.
    #[error("out-of-order append: {attempted} is not after {last}")]
    OutOfOrder {
        /// Timestamp of the current last entry.
        last: Timestamp,
        /// Timestamp of the rejected entry.
        attempted: Timestamp,
    },

    /// The store was shut down.
    #[error("log store closed")]
    Closed,
}

/// Errors that can occur while serving a change feed.
#[derive(Error, Debug)]
pub enum FeedError {
    /// The request named no resources.
    #[error(
        "You have not specified any resources, please do so by providing \"resources=foo,bar\" as query"
    )]
    NoResources,

    /// The request named resources the registry does not know.
    #[error("The following resources don't exist: {}", .0.join(","))]
    MissingResources(Vec<String>),

    /// The resumption cursor could not be parsed.
    #[error("Could not parse the time stamp provided: {0:?}")]
    InvalidCursor(String),

    /// Invalid setup-time configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Computing the start position failed.
    #[error("query failed: {0}")]
    Query(StoreError),

    /// Tailing the log failed mid-stream.
    #[error("stream failed: {0}")]
    Stream(StoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FeedError::NoResources | FeedError::MissingResources(_) | FeedError::InvalidCursor(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns a stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            FeedError::NoResources | FeedError::MissingResources(_) => "MISSING_RESOURCE",
            FeedError::InvalidCursor(_) => "INVALID_TIMESTAMP",
            FeedError::Config(_) => "CONFIG_ERROR",
            FeedError::Query(_) => "QUERY_FAILED",
            FeedError::Stream(_) => "STREAM_FAILED",
            FeedError::Internal(_) => "INTERNAL_ERROR",
            FeedError::Io(_) => "IO_ERROR",
        }
    }
}

impl From<ProtocolError> for FeedError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidCursor(cursor) => FeedError::InvalidCursor(cursor),
            other => FeedError::Config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(FeedError::NoResources.is_client_error());
        assert!(FeedError::MissingResources(vec!["x".into()]).is_client_error());
        assert!(FeedError::InvalidCursor("1".into()).is_client_error());
        assert!(FeedError::Query(StoreError::Closed).is_server_error());
        assert!(!FeedError::Internal("oops".into()).is_client_error());
    }

    #[test]
    fn missing_resources_are_listed() {
        let err = FeedError::MissingResources(vec!["unknown".into(), "other".into()]);
        assert_eq!(
            err.to_string(),
            "The following resources don't exist: unknown,other"
        );
    }

    #[test]
    fn protocol_cursor_error_maps_to_invalid_cursor() {
        let err: FeedError = ProtocolError::InvalidCursor("a_b".into()).into();
        assert!(matches!(err, FeedError::InvalidCursor(ref c) if c == "a_b"));
        assert_eq!(err.code(), "INVALID_TIMESTAMP");

        let err: FeedError = ProtocolError::UnknownVerb("patch".into()).into();
        assert!(matches!(err, FeedError::Config(_)));
        assert!(err.is_server_error());
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::OutOfOrder {
            last: Timestamp::new(10, 2),
            attempted: Timestamp::new(10, 1),
        };
        let msg = err.to_string();
        assert!(msg.contains("10_2"));
        assert!(msg.contains("10_1"));
    }
}
