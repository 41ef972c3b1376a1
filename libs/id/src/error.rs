//! Error types for identifier parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The identifier string is empty.
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },

    /// The identifier does not start with the required prefix.
    #[error("invalid {kind}: expected prefix '{expected}', got '{actual}'")]
    InvalidPrefix {
        kind: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// The identifier exceeds the maximum length.
    #[error("{kind} exceeds {max} characters (got {actual})")]
    TooLong {
        kind: &'static str,
        max: usize,
        actual: usize,
    },

    /// The identifier format is invalid.
    #[error("invalid {kind}: {message}")]
    InvalidFormat { kind: &'static str, message: String },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty { .. })
    }

    /// Returns true if this error indicates a prefix mismatch.
    pub fn is_prefix_error(&self) -> bool {
        matches!(self, IdError::InvalidPrefix { .. })
    }

    pub(crate) fn format(kind: &'static str, message: impl Into<String>) -> Self {
        IdError::InvalidFormat {
            kind,
            message: message.into(),
        }
    }
}
