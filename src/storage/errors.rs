//! Storage-specific error types.
//!
//! These describe persistence failures only. They know nothing about HTTP; the
//! conversion into [`ODataError`](crate::error::ODataError) picks status codes.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// No entity is stored under the key.
    ResourceNotFound { entity_type: String, key: String },

    /// An entity is already stored under the key.
    ResourceAlreadyExists { entity_type: String, key: String },

    /// The stored entity changed since the caller read it.
    PreconditionFailed { entity_type: String, key: String },

    /// The data cannot be stored as given.
    InvalidData { message: String },

    /// The backend is temporarily unavailable.
    Unavailable { message: String },

    /// Generic internal storage error.
    Internal {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ResourceNotFound { entity_type, key } => {
                write!(f, "Entity not found: {}{}", entity_type, key)
            }
            StorageError::ResourceAlreadyExists { entity_type, key } => {
                write!(f, "Entity already exists: {}{}", entity_type, key)
            }
            StorageError::PreconditionFailed { entity_type, key } => {
                write!(f, "Entity changed concurrently: {}{}", entity_type, key)
            }
            StorageError::InvalidData { message } => write!(f, "Invalid data: {}", message),
            StorageError::Unavailable { message } => {
                write!(f, "Storage unavailable: {}", message)
            }
            StorageError::Internal { message, .. } => {
                write!(f, "Internal storage error: {}", message)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Internal {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl StorageError {
    pub fn resource_not_found(entity_type: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::ResourceNotFound {
            entity_type: entity_type.into(),
            key: key.to_string(),
        }
    }

    pub fn resource_already_exists(entity_type: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::ResourceAlreadyExists {
            entity_type: entity_type.into(),
            key: key.to_string(),
        }
    }

    pub fn precondition_failed(entity_type: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::PreconditionFailed {
            entity_type: entity_type.into(),
            key: key.to_string(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether retrying the operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}
