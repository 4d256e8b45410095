//! Collection error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for collection operations
pub type CollectionResult<T> = Result<T, CollectionError>;

/// Errors surfaced to the single caller of a collection operation
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum CollectionError {
    /// Payload was produced with a different element type than the caller declared
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Dictionary add on a key that already exists
    #[error("An item with the same key has already been added: {0}")]
    DuplicateKey(String),

    /// List position or range outside the current list
    #[error("Index {index} is out of range for a list of {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    /// Collection keys must be non-empty
    #[error("Invalid collection key: {0:?}")]
    InvalidKey(String),

    /// The reply variant does not match the command
    #[error("Unexpected reply: expected {expected}, got {actual}")]
    UnexpectedReply { expected: String, actual: String },

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// RPC transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error reported by the remote collection service
    #[error("Remote error: {0}")]
    Remote(String),
}

impl From<serde_json::Error> for CollectionError {
    fn from(err: serde_json::Error) -> Self {
        CollectionError::Serialization(err.to_string())
    }
}
