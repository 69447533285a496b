//! Cloud provider error types
//!
//! [`ApiError`] is what a remote call returns, classified by what the caller
//! may do about it. [`CloudError`] is what a resource operation surfaces to
//! its user, always naming the resource it concerns.

use crate::resource::ResourceRef;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classification of a failed remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The resource does not exist (or is not visible yet)
    NotFound,
    /// Transient; safe to re-poll or re-attempt
    Retryable,
    /// Malformed input, permission denial, or any other unrecoverable failure
    Fatal,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::NotFound => write!(f, "not found"),
            ApiErrorKind::Retryable => write!(f, "retryable"),
            ApiErrorKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// Error returned by a remote API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// Service error code, when the API reports one
    pub code: Option<String>,
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Retryable, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Fatal, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ApiErrorKind::Retryable
    }

    /// True when the error carries `code` and its message contains `needle`
    pub fn code_message_contains(&self, code: &str, needle: &str) -> bool {
        self.code.as_deref() == Some(code) && self.message.contains(needle)
    }
}

/// Cloud resource operation errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("{resource} not found")]
    NotFound {
        resource: ResourceRef,
        #[source]
        source: Option<ApiError>,
    },

    #[error("{operation} {resource}: {source}")]
    Api {
        operation: &'static str,
        resource: ResourceRef,
        #[source]
        source: ApiError,
    },

    #[error(
        "{resource} entered failure status {status}: {}",
        .reason.as_deref().unwrap_or("no reason reported")
    )]
    TerminalFailure {
        resource: ResourceRef,
        status: String,
        reason: Option<String>,
    },

    #[error(
        "Timeout after {timeout:?} waiting for {resource} (last status: {})",
        .last_status.as_deref().unwrap_or("unknown")
    )]
    TimedOut {
        resource: ResourceRef,
        timeout: Duration,
        last_status: Option<String>,
    },

    #[error(
        "Cancelled while waiting for {resource} (last status: {})",
        .last_status.as_deref().unwrap_or("unknown")
    )]
    Cancelled {
        resource: ResourceRef,
        last_status: Option<String>,
    },

    #[error("{operation} {resource}: empty result")]
    EmptyResult {
        operation: &'static str,
        resource: ResourceRef,
    },

    #[error("{resource}: changing {fields:?} requires replacing the resource")]
    RequiresReplacement {
        resource: ResourceRef,
        fields: Vec<&'static str>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] stratus_config::ConfigError),
}

impl CloudError {
    /// Wrap a failed API call with the operation and resource it concerns
    ///
    /// Not-found responses become [`CloudError::NotFound`] so callers can
    /// tell them apart from fatal failures.
    pub fn api(operation: &'static str, resource: &ResourceRef, source: ApiError) -> Self {
        if source.is_not_found() {
            CloudError::NotFound {
                resource: resource.clone(),
                source: Some(source),
            }
        } else {
            CloudError::Api {
                operation,
                resource: resource.clone(),
                source,
            }
        }
    }

    pub fn not_found(resource: &ResourceRef) -> Self {
        CloudError::NotFound {
            resource: resource.clone(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
