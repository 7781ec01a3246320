//! Errors raised while parsing and validating a batch body.
//!
//! Every variant is fatal to the whole batch except [`BatchError::InvalidUriScope`]
//! under [`ScopeViolationPolicy::FailFrame`](crate::config::ScopeViolationPolicy).

use crate::error::ODataError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("Content-Type '{content_type}' is not multipart/mixed")]
    UnsupportedMediaType { content_type: String },

    #[error("Content-Type '{content_type}' has no usable boundary")]
    MissingBoundary { content_type: String },

    #[error("line {line}: {message}")]
    MalformedFraming { line: usize, message: String },

    #[error("line {line}: part is missing required header {header}")]
    MissingPartHeader { line: usize, header: &'static str },

    #[error("line {line}: changesets are not supported")]
    UnsupportedChangeset { line: usize },

    #[error("batch contains more than {max} parts")]
    TooManyParts { max: usize },

    #[error("batch body of {size} bytes exceeds the limit of {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("sub-request URI '{uri}' is an absolute path")]
    InvalidRelativeUri { uri: String },

    #[error("sub-request URI '{uri}' is outside the service root '{service_root}'")]
    InvalidUriScope { uri: String, service_root: String },

    #[error("sub-request URI '{uri}' addresses foreign host '{host}'")]
    InvalidHost { uri: String, host: String },
}

impl BatchError {
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::MalformedFraming {
            line,
            message: message.into(),
        }
    }
}

impl From<BatchError> for ODataError {
    fn from(error: BatchError) -> Self {
        match error {
            BatchError::InvalidRelativeUri { uri } => Self::InvalidRelativeUri { uri },
            BatchError::InvalidUriScope { uri, service_root } => {
                Self::InvalidUriScope { uri, service_root }
            }
            BatchError::InvalidHost { uri, host } => Self::InvalidHost { uri, host },
            BatchError::UnsupportedMediaType { content_type } => {
                Self::UnsupportedMediaType { content_type }
            }
            other => Self::MalformedBatchFraming {
                message: other.to_string(),
            },
        }
    }
}

pub type BatchResult<T> = Result<T, BatchError>;
