//! Maps backend failures to error classes.
//!
//! Throttling, concurrent modification and transient server errors are
//! expected under normal multi-tenant load and are retried under the stage's
//! retry budget. Everything else is a caller or permission problem and fails
//! the workflow immediately.

use ssoa_events::HandlerErrorCode;

use crate::{ApiError, ApiErrorCode};

/// Classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Throttling or concurrent modification; long backoff.
    Throttled,
    /// Transient server error; short backoff.
    Transient,
    NotFound,
    Conflict,
    InvalidInput,
    AccessDenied,
    Unknown,
}

impl ErrorClass {
    /// Returns true if the failure may be retried under a budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled | Self::Transient)
    }

    /// Error code reported when this class ends a workflow.
    ///
    /// Retryable classes only end a workflow when the budget runs out, which
    /// is reported as a generic service exception.
    pub fn failure_code(&self) -> HandlerErrorCode {
        match self {
            Self::Throttled | Self::Transient => HandlerErrorCode::GeneralServiceException,
            Self::NotFound => HandlerErrorCode::NotFound,
            Self::Conflict => HandlerErrorCode::AlreadyExists,
            Self::InvalidInput => HandlerErrorCode::InvalidRequest,
            Self::AccessDenied => HandlerErrorCode::AccessDenied,
            Self::Unknown => HandlerErrorCode::InternalFailure,
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Throttled => "retryable_throttled",
            Self::Transient => "retryable_transient",
            Self::NotFound => "terminal_not_found",
            Self::Conflict => "terminal_conflict",
            Self::InvalidInput => "terminal_invalid_input",
            Self::AccessDenied => "terminal_access_denied",
            Self::Unknown => "terminal_unknown",
        };
        f.write_str(s)
    }
}

/// Classifies a backend failure.
pub fn classify(error: &ApiError) -> ErrorClass {
    match error.code {
        ApiErrorCode::Throttling | ApiErrorCode::ConcurrentModification => ErrorClass::Throttled,
        ApiErrorCode::InternalServer => ErrorClass::Transient,
        ApiErrorCode::ResourceNotFound => ErrorClass::NotFound,
        ApiErrorCode::AlreadyExists => ErrorClass::Conflict,
        ApiErrorCode::Validation => ErrorClass::InvalidInput,
        ApiErrorCode::AccessDenied => ErrorClass::AccessDenied,
        ApiErrorCode::Unrecognized(_) => ErrorClass::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("ThrottlingException", ErrorClass::Throttled)]
    #[case("ConflictException", ErrorClass::Throttled)]
    #[case("InternalServerException", ErrorClass::Transient)]
    #[case("ResourceNotFoundException", ErrorClass::NotFound)]
    #[case("AlreadyExistsException", ErrorClass::Conflict)]
    #[case("ValidationException", ErrorClass::InvalidInput)]
    #[case("AccessDeniedException", ErrorClass::AccessDenied)]
    #[case("ServiceQuotaExceededException", ErrorClass::Unknown)]
    fn test_classification_table(#[case] code: &str, #[case] expected: ErrorClass) {
        let error = ApiError::from_service(code, "boom");
        assert_eq!(classify(&error), expected);
    }

    #[test]
    fn test_only_throttled_and_transient_retry() {
        assert!(ErrorClass::Throttled.is_retryable());
        assert!(ErrorClass::Transient.is_retryable());
        assert!(!ErrorClass::NotFound.is_retryable());
        assert!(!ErrorClass::Unknown.is_retryable());
    }

    #[test]
    fn test_failure_codes() {
        assert_eq!(
            ErrorClass::Conflict.failure_code(),
            HandlerErrorCode::AlreadyExists
        );
        assert_eq!(
            ErrorClass::InvalidInput.failure_code(),
            HandlerErrorCode::InvalidRequest
        );
        assert_eq!(
            ErrorClass::Throttled.failure_code(),
            HandlerErrorCode::GeneralServiceException
        );
    }
}
