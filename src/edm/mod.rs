//! Entity Data Model: the metadata describing what a service exposes.
//!
//! The model is assembled with [`EdmModelBuilder`], checked for consistency once,
//! and then shared read-only by every request handler.
//!
//! # Key Types
//!
//! - [`EdmModel`] - Validated, immutable model with lookup and payload checks
//! - [`EntityType`] / [`ComplexType`] - Structured types
//! - [`EntitySet`] - Addressable collection of entities with navigation bindings
//! - [`Operation`] - Action or function signature
//! - [`EntityKey`] - Value identity of an entity
//!
//! # Examples
//!
//! ```rust
//! use odata_server::edm::{EdmModel, EntitySet, EntityType, PrimitiveKind, Property};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = EdmModel::builder("olingo.odata.test1")
//!     .entity_type(
//!         EntityType::new("ETAllPrim")
//!             .with_key_property("PropertyInt16", PrimitiveKind::Int16)
//!             .with_property(Property::primitive("PropertyString", PrimitiveKind::String)),
//!     )
//!     .entity_set(EntitySet::new("ESAllPrim", "ETAllPrim"))
//!     .build()?;
//! assert!(model.entity_set("ESAllPrim").is_ok());
//! # Ok(())
//! # }
//! ```

pub mod annotation;
pub mod errors;
pub mod key;
pub mod model;
pub mod primitive;
pub mod types;

#[cfg(test)]
mod tests;

pub use annotation::{Annotation, AnnotationExpression, ConstantExpression};
pub use errors::{EdmError, EdmResult};
pub use key::{EntityKey, KeyValue};
pub use model::{EdmModel, EdmModelBuilder, EntityValidation};
pub use primitive::PrimitiveKind;
pub use types::{
    ComplexType, ContentMapping, EntitySet, EntityType, Multiplicity, NavigationProperty,
    Operation, OperationBinding, OperationKind, Parameter, Property, PropertyType,
    ReferentialConstraint, ReturnType,
};
