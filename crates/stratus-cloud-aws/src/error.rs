//! AWS error classification
//!
//! AWS reports failures as an error code plus a message. The resources only
//! care whether a failure means "not there", "try again", or "give up", so
//! codes are mapped onto [`ApiErrorKind`] here, once for every service.

use stratus_cloud::{ApiError, ApiErrorKind};

/// Codes every service uses for a missing resource
const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "EntityDoesNotExistException",
    "NotFoundException",
    "ResourceNotFound",
];

/// Throttling and server-side codes that are safe to retry
const RETRYABLE_CODES: &[&str] = &[
    "ThrottlingException",
    "Throttling",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "ServiceUnavailable",
    "ServiceUnavailableException",
    "ServiceException",
    "InternalFailure",
    "InternalServerError",
    "InternalServerException",
    "ClientException",
];

/// Classify an AWS error code
pub fn classify(code: &str) -> ApiErrorKind {
    if NOT_FOUND_CODES.contains(&code) {
        ApiErrorKind::NotFound
    } else if RETRYABLE_CODES.contains(&code) {
        ApiErrorKind::Retryable
    } else {
        ApiErrorKind::Fatal
    }
}

/// Build an [`ApiError`] from an AWS error code and message
pub fn api_error(code: impl Into<String>, message: impl Into<String>) -> ApiError {
    let code = code.into();
    ApiError::new(classify(&code), message).with_code(code)
}
