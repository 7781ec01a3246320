//! Operation (action and function) invocation.
//!
//! Operation signatures live in the [`EdmModel`](crate::edm::EdmModel); their
//! behavior is supplied by the service as [`OperationImplementation`]s registered
//! in an [`OperationRegistry`]. The [`OperationInvoker`] checks arguments against
//! the signature, calls the implementation, and checks the result against the
//! declared return type.

pub mod invoker;
pub mod registry;


pub use invoker::{InvocationResult, OperationInvoker};
pub use registry::{InvocationContext, OperationFuture, OperationImplementation, OperationRegistry};

use crate::edm::EntityKey;
use serde_json::{Map, Value};

/// Typed value produced by an operation implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationValue {
    /// No value; valid for operations without a return type, or a null single value
    None,
    Primitive(Value),
    PrimitiveCollection(Vec<Value>),
    Complex(Map<String, Value>),
    ComplexCollection(Vec<Map<String, Value>>),
    Entity(Map<String, Value>),
    EntityCollection(Vec<Map<String, Value>>),
}

impl OperationValue {
    /// Short name of the value shape, for error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::None => "no value",
            Self::Primitive(_) => "a primitive",
            Self::PrimitiveCollection(_) => "a primitive collection",
            Self::Complex(_) => "a complex value",
            Self::ComplexCollection(_) => "a complex collection",
            Self::Entity(_) => "an entity",
            Self::EntityCollection(_) => "an entity collection",
        }
    }
}

/// What an implementation returns.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome {
    pub value: OperationValue,
    /// The entity result was newly created by the call
    pub created: bool,
}

impl OperationOutcome {
    pub fn value(value: OperationValue) -> Self {
        Self {
            value,
            created: false,
        }
    }

    /// A newly created entity.
    pub fn created(entity: Map<String, Value>) -> Self {
        Self {
            value: OperationValue::Entity(entity),
            created: true,
        }
    }

    pub fn none() -> Self {
        Self::value(OperationValue::None)
    }

    pub fn primitive(value: impl Into<Value>) -> Self {
        Self::value(OperationValue::Primitive(value.into()))
    }
}

/// The instance a bound operation is invoked on.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundInstance {
    Entity {
        entity_set: String,
        key: EntityKey,
        data: Map<String, Value>,
    },
    Collection {
        entity_set: String,
        entities: Vec<Map<String, Value>>,
    },
}
