//! Error types for protocol parsing.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while parsing protocol values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A resumption cursor could not be parsed.
    #[error("invalid cursor: {0:?}")]
    InvalidCursor(String),

    /// A verb name is not one of the supported verbs.
    #[error("unknown verb: {0:?}")]
    UnknownVerb(String),

    /// An oplog operation code is not recognised.
    #[error("unknown operation code: {0:?}")]
    UnknownOperation(String),
}
