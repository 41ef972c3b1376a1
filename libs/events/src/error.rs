//! Error types for request and event handling.

use thiserror::Error;

/// Errors that can occur when decoding requests or encoding events.
#[derive(Debug, Error, Clone)]
pub enum EventError {
    /// The action name is unknown.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The resource type name is unknown.
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    /// The desired model does not match the resource schema.
    #[error("invalid resource model: {0}")]
    InvalidModel(String),

    /// The callback context could not be decoded.
    #[error("invalid callback context: {0}")]
    InvalidContext(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}
