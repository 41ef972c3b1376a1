//! Handler error types.

use ssoa_events::{EventError, HandlerErrorCode};
use thiserror::Error;

/// Failures that end an invocation before or outside the workflow.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request could not be decoded.
    #[error(transparent)]
    Event(#[from] EventError),

    /// The desired model is well-formed but cannot be applied.
    #[error("{0}")]
    InvalidRequest(String),

    /// A result model could not be encoded.
    #[error("failed to encode resource model: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HandlerError {
    pub fn invalid_model(err: serde_json::Error) -> Self {
        HandlerError::Event(EventError::InvalidModel(err.to_string()))
    }

    /// Error code reported to the driver.
    pub fn error_code(&self) -> HandlerErrorCode {
        match self {
            HandlerError::Event(_) | HandlerError::InvalidRequest(_) => {
                HandlerErrorCode::InvalidRequest
            }
            HandlerError::Encode(_) | HandlerError::Config(_) => HandlerErrorCode::InternalFailure,
        }
    }
}
