//! Resolution of a parsed resource path against the model.

use crate::edm::{EdmModel, EntityKey, EntitySet, EntityType, OperationBinding};
use crate::error::{ODataError, ODataResult};
use crate::uri::{PathSegment, ResourcePath};

/// Raw `(name, literal)` arguments of a segment.
pub type Arguments = Vec<(Option<String>, String)>;

/// What a request addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    ServiceDocument,
    Metadata,
    Batch,
    EntitySet {
        entity_set: String,
    },
    Count {
        entity_set: String,
    },
    Entity {
        entity_set: String,
        key: EntityKey,
    },
    Property {
        entity_set: String,
        key: EntityKey,
        property: String,
        /// `/$value` suffix
        raw: bool,
    },
    Navigation {
        entity_set: String,
        key: EntityKey,
        navigation: String,
        /// `/$ref` suffix
        reference: bool,
    },
    Operation {
        name: String,
        binding: OperationTarget,
        arguments: Option<Arguments>,
    },
}

/// Resource an operation segment is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationTarget {
    Unbound,
    Entity { entity_set: String, key: EntityKey },
    Collection { entity_set: String },
}

impl Target {
    /// Entity set the target lives in, if any.
    pub fn entity_set(&self) -> Option<&str> {
        match self {
            Self::EntitySet { entity_set }
            | Self::Count { entity_set }
            | Self::Entity { entity_set, .. }
            | Self::Property { entity_set, .. }
            | Self::Navigation { entity_set, .. } => Some(entity_set),
            Self::Operation { binding, .. } => match binding {
                OperationTarget::Unbound => None,
                OperationTarget::Entity { entity_set, .. }
                | OperationTarget::Collection { entity_set } => Some(entity_set),
            },
            Self::ServiceDocument | Self::Metadata | Self::Batch => None,
        }
    }
}

pub fn resolve(model: &EdmModel, path: &ResourcePath) -> ODataResult<Target> {
    let Some((first, rest)) = path.segments.split_first() else {
        return Ok(Target::ServiceDocument);
    };

    if first.is_system() {
        return match (first.name.as_str(), rest, &first.arguments) {
            ("$metadata", [], None) => Ok(Target::Metadata),
            ("$batch", [], None) => Ok(Target::Batch),
            _ => Err(ODataError::not_found(first.name.clone())),
        };
    }

    if let Ok(entity_set) = model.entity_set(&first.name) {
        let entity_type = model.resolve_entity_type(&entity_set.entity_type)?;
        let base = match &first.arguments {
            None => Target::EntitySet {
                entity_set: entity_set.name.clone(),
            },
            Some(arguments) => Target::Entity {
                entity_set: entity_set.name.clone(),
                key: model.parse_key(entity_type, arguments)?,
            },
        };
        return resolve_rest(model, entity_set, entity_type, base, rest);
    }

    if bound_operation(model, &first.name, &OperationBinding::Unbound) {
        if !rest.is_empty() {
            return Err(ODataError::bad_request(
                "path segments after an operation call are not supported",
            ));
        }
        return Ok(Target::Operation {
            name: first.name.clone(),
            binding: OperationTarget::Unbound,
            arguments: first.arguments.clone(),
        });
    }

    Err(ODataError::not_found(first.name.clone()))
}

fn resolve_rest(
    model: &EdmModel,
    entity_set: &EntitySet,
    entity_type: &EntityType,
    base: Target,
    rest: &[PathSegment],
) -> ODataResult<Target> {
    let Some((segment, tail)) = rest.split_first() else {
        return Ok(base);
    };
    let type_name = model.unqualified(&entity_type.name).to_string();

    match base {
        Target::EntitySet { entity_set: name } => {
            if segment.name == "$count" && segment.arguments.is_none() && tail.is_empty() {
                return Ok(Target::Count { entity_set: name });
            }
            if tail.is_empty()
                && bound_operation(
                    model,
                    &segment.name,
                    &OperationBinding::EntityCollection(type_name),
                )
            {
                return Ok(Target::Operation {
                    name: segment.name.clone(),
                    binding: OperationTarget::Collection { entity_set: name },
                    arguments: segment.arguments.clone(),
                });
            }
            Err(ODataError::not_found(format!("{}/{}", entity_set.name, segment.name)))
        }
        Target::Entity {
            entity_set: name,
            key,
        } => {
            if entity_type.property(&segment.name).is_some() {
                no_arguments(segment)?;
                let raw = match tail {
                    [] => false,
                    [value] if value.name == "$value" && value.arguments.is_none() => true,
                    _ => return Err(ODataError::bad_request("unsupported path after property")),
                };
                return Ok(Target::Property {
                    entity_set: name,
                    key,
                    property: segment.name.clone(),
                    raw,
                });
            }
            if entity_type.navigation(&segment.name).is_some() {
                no_arguments(segment)?;
                let reference = match tail {
                    [] => false,
                    [r] if r.name == "$ref" && r.arguments.is_none() => true,
                    _ => {
                        return Err(ODataError::bad_request(
                            "unsupported path after navigation property",
                        ));
                    }
                };
                return Ok(Target::Navigation {
                    entity_set: name,
                    key,
                    navigation: segment.name.clone(),
                    reference,
                });
            }
            if tail.is_empty()
                && bound_operation(model, &segment.name, &OperationBinding::Entity(type_name))
            {
                return Ok(Target::Operation {
                    name: segment.name.clone(),
                    binding: OperationTarget::Entity {
                        entity_set: name,
                        key,
                    },
                    arguments: segment.arguments.clone(),
                });
            }
            Err(ODataError::not_found(format!("{}/{}", entity_set.name, segment.name)))
        }
        _ => Err(ODataError::not_found(segment.name.clone())),
    }
}

fn no_arguments(segment: &PathSegment) -> ODataResult<()> {
    match segment.arguments {
        None => Ok(()),
        Some(_) => Err(ODataError::bad_request(format!(
            "segment '{}' does not take arguments",
            segment.name
        ))),
    }
}

/// Whether an overload of `name` has the given binding.
fn bound_operation(model: &EdmModel, name: &str, binding: &OperationBinding) -> bool {
    let binding = model.normalized_binding(binding.clone());
    model
        .operations_named(name)
        .iter()
        .any(|op| op.binding == binding)
}
