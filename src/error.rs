//! Error types for OData request processing.
//!
//! Every failure that can reach a client is an [`ODataError`]. Each variant maps
//! to exactly one HTTP status code and one stable machine-readable error code,
//! which the format codec renders as the structured error body.

use crate::storage::StorageError;
use http::StatusCode;

/// Main error type for OData request processing.
#[derive(Debug, thiserror::Error)]
pub enum ODataError {
    /// A batch sub-request URI was an absolute path (`/...`) without scheme and host
    #[error("Invalid relative URI in batch request: {uri}")]
    InvalidRelativeUri { uri: String },

    /// A batch sub-request URI resolved outside the service root
    #[error("URI '{uri}' is outside the scope of the service root '{service_root}'")]
    InvalidUriScope { uri: String, service_root: String },

    /// A batch sub-request URI addressed a different host than the service
    #[error("URI '{uri}' addresses host '{host}' which is not the service host")]
    InvalidHost { uri: String, host: String },

    /// The multipart framing of a batch body could not be parsed
    #[error("Malformed batch framing: {message}")]
    MalformedBatchFraming { message: String },

    /// An operation parameter was unknown, missing, or of the wrong type
    #[error("Invalid parameter '{parameter}' for operation '{operation}': {reason}")]
    InvalidParameter {
        operation: String,
        parameter: String,
        reason: String,
    },

    /// An operation implementation returned a result that does not match its declared return type
    #[error("Operation '{operation}' returned {actual} but declares {expected}")]
    ResultTypeMismatch {
        operation: String,
        expected: String,
        actual: String,
    },

    /// The HTTP method is not allowed for the addressed resource
    #[error("Method {method} is not allowed for {target}")]
    MethodNotAllowed { method: String, target: String },

    /// The key predicate does not match the key of the entity type
    #[error("Invalid key for entity type '{entity_type}': {reason}")]
    InvalidKey { entity_type: String, reason: String },

    /// The addressed resource does not exist
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// An entity with the same key already exists
    #[error("Entity '{entity_type}' with key {key} already exists")]
    StorageConflict { entity_type: String, key: String },

    /// A property value does not conform to its declared type
    #[error("Invalid value for property '{property}': {reason}")]
    Validation { property: String, reason: String },

    /// An If-Match precondition did not hold
    #[error("Precondition failed for {resource}")]
    PreconditionFailed { resource: String },

    /// The request authorizer rejected the request
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// The request content type is not supported for the addressed resource
    #[error("Unsupported media type: {content_type}")]
    UnsupportedMediaType { content_type: String },

    /// Malformed request that is not covered by a more specific kind
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// No implementation is registered for a declared operation
    #[error("Operation '{operation}' is not implemented")]
    NotImplemented { operation: String },

    /// Errors from the storage provider
    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),

    /// Payload encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ODataError {
    /// HTTP status code reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRelativeUri { .. }
            | Self::InvalidUriScope { .. }
            | Self::InvalidHost { .. }
            | Self::MalformedBatchFraming { .. }
            | Self::InvalidParameter { .. }
            | Self::InvalidKey { .. }
            | Self::Validation { .. }
            | Self::BadRequest { .. }
            | Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::StorageConflict { .. } => StatusCode::CONFLICT,
            Self::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            Self::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::Storage(e) => match e {
                StorageError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
                StorageError::ResourceAlreadyExists { .. } => StatusCode::CONFLICT,
                StorageError::InvalidData { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::ResultTypeMismatch { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code used in the structured error body.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRelativeUri { .. } => "INVALID_RELATIVE_URI",
            Self::InvalidUriScope { .. } => "INVALID_URI_SCOPE",
            Self::InvalidHost { .. } => "INVALID_HOST",
            Self::MalformedBatchFraming { .. } => "MALFORMED_BATCH_FRAMING",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::ResultTypeMismatch { .. } => "RESULT_TYPE_MISMATCH",
            Self::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            Self::InvalidKey { .. } => "INVALID_KEY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::StorageConflict { .. } => "STORAGE_CONFLICT",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
            Self::BadRequest { .. } | Self::Json(_) => "BAD_REQUEST",
            Self::NotImplemented { .. } => "NOT_IMPLEMENTED",
            Self::Storage(StorageError::ResourceNotFound { .. }) => "NOT_FOUND",
            Self::Storage(StorageError::ResourceAlreadyExists { .. }) => "STORAGE_CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Optional target (property, parameter or URI) the error refers to.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::InvalidRelativeUri { uri }
            | Self::InvalidUriScope { uri, .. }
            | Self::InvalidHost { uri, .. } => Some(uri),
            Self::InvalidParameter { parameter, .. } => Some(parameter),
            Self::Validation { property, .. } => Some(property),
            _ => None,
        }
    }

    /// Whether this error aborts a whole batch rather than a single frame.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidRelativeUri { .. }
                | Self::InvalidUriScope { .. }
                | Self::InvalidHost { .. }
                | Self::MalformedBatchFraming { .. }
        )
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(entity_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            entity_type: entity_type.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        operation: impl Into<String>,
        parameter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            operation: operation.into(),
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Create a method not allowed error
    pub fn method_not_allowed(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
            target: target.into(),
        }
    }

    /// Create a property validation error
    pub fn validation(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a malformed batch framing error
    pub fn malformed_batch(message: impl Into<String>) -> Self {
        Self::MalformedBatchFraming {
            message: message.into(),
        }
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<StorageError> for ODataError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::ResourceAlreadyExists { entity_type, key } => {
                Self::StorageConflict { entity_type, key }
            }
            StorageError::ResourceNotFound { entity_type, key } => Self::NotFound {
                resource: format!("{}{}", entity_type, key),
            },
            StorageError::PreconditionFailed { entity_type, key } => Self::PreconditionFailed {
                resource: format!("{}{}", entity_type, key),
            },
            other => Self::Storage(other),
        }
    }
}

pub type ODataResult<T> = Result<T, ODataError>;
