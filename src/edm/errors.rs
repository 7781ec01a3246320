//! Model construction errors.
//!
//! These are programming errors in a model definition and surface when the
//! model is built, never while a request is being processed.

/// Errors raised by [`EdmModelBuilder::build`](super::EdmModelBuilder::build).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EdmError {
    #[error("Duplicate {element} '{name}'")]
    Duplicate { element: &'static str, name: String },

    #[error("Entity type '{entity_type}' declares no key")]
    MissingKey { entity_type: String },

    #[error("Key property '{property}' of '{entity_type}' is not a declared property")]
    UnknownKeyProperty {
        entity_type: String,
        property: String,
    },

    #[error("Key property '{property}' of '{entity_type}' must be a non-nullable key-capable primitive")]
    InvalidKeyProperty {
        entity_type: String,
        property: String,
    },

    #[error("'{owner}' references unknown type '{type_name}'")]
    UnknownType { owner: String, type_name: String },

    #[error("Navigation '{entity_type}/{navigation}' declares partner '{partner}' which does not point back")]
    InconsistentPartner {
        entity_type: String,
        navigation: String,
        partner: String,
    },

    #[error("Referential constraint on '{entity_type}/{navigation}' names unknown property '{property}'")]
    UnknownConstraintProperty {
        entity_type: String,
        navigation: String,
        property: String,
    },

    #[error("Entity set '{entity_set}' binds '{navigation}' to '{target}': {reason}")]
    InvalidBinding {
        entity_set: String,
        navigation: String,
        target: String,
        reason: String,
    },

    #[error("Operation '{operation}' declares parameter '{parameter}' more than once")]
    DuplicateParameter { operation: String, parameter: String },

    #[error("Operation '{operation}' has an overload with an identical binding and parameter signature")]
    AmbiguousOverload { operation: String },
}

pub type EdmResult<T> = Result<T, EdmError>;
