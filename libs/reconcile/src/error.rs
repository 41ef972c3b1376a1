//! Backend failure representation.

use thiserror::Error;

/// Identity of a backend failure.
///
/// Parsed from the service exception name; anything unknown is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ApiErrorCode {
    /// Request rate exceeded.
    Throttling,
    /// Another request modified the resource concurrently.
    ConcurrentModification,
    /// Transient server-side failure.
    InternalServer,
    /// The resource or its parent does not exist.
    ResourceNotFound,
    /// An equivalent resource already exists.
    AlreadyExists,
    /// The request was malformed.
    Validation,
    /// The caller lacks permission.
    AccessDenied,
    /// Any other service exception.
    Unrecognized(String),
}

impl ApiErrorCode {
    /// Parses a service exception name such as `ThrottlingException`.
    pub fn from_service_code(code: &str) -> Self {
        match code {
            "ThrottlingException" | "TooManyRequestsException" => Self::Throttling,
            "ConflictException" => Self::ConcurrentModification,
            "InternalServerException" | "ServiceUnavailableException" => Self::InternalServer,
            "ResourceNotFoundException" => Self::ResourceNotFound,
            "AlreadyExistsException" | "DuplicateResourceException" => Self::AlreadyExists,
            "ValidationException" => Self::Validation,
            "AccessDeniedException" => Self::AccessDenied,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Returns the service exception name.
    pub fn service_code(&self) -> &str {
        match self {
            Self::Throttling => "ThrottlingException",
            Self::ConcurrentModification => "ConflictException",
            Self::InternalServer => "InternalServerException",
            Self::ResourceNotFound => "ResourceNotFoundException",
            Self::AlreadyExists => "AlreadyExistsException",
            Self::Validation => "ValidationException",
            Self::AccessDenied => "AccessDeniedException",
            Self::Unrecognized(code) => code,
        }
    }
}

impl std::fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.service_code())
    }
}

/// A failed backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Failure identity.
    pub code: ApiErrorCode,

    /// Backend-supplied message, reported verbatim on failure.
    pub message: String,
}

impl ApiError {
    /// Creates an error with the given code and message.
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an error from a service exception name.
    pub fn from_service(code: &str, message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::from_service_code(code), message)
    }

    pub fn throttling(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Throttling, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ConcurrentModification, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InternalServer, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ResourceNotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::AlreadyExists, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Validation, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::AccessDenied, message)
    }

    /// Returns true if the backend reported a missing resource.
    pub fn is_not_found(&self) -> bool {
        self.code == ApiErrorCode::ResourceNotFound
    }

    /// The message to surface to callers: the backend text, or the code if
    /// the backend sent none.
    pub fn reason(&self) -> String {
        if self.message.is_empty() {
            self.code.to_string()
        } else {
            self.message.clone()
        }
    }
}
