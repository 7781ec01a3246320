//! The Entity Data Model and its builder.
//!
//! An [`EdmModel`] is assembled once with [`EdmModelBuilder`], validated, and is
//! read-only afterwards. It is shared between in-flight requests behind an `Arc`
//! without synchronization.

use super::errors::{EdmError, EdmResult};
use super::key::{EntityKey, KeyValue};
use super::primitive::json_type_name;
use super::types::{
    ComplexType, EntitySet, EntityType, Operation, OperationBinding, PropertyType, ReturnType,
};
use crate::error::{ODataError, ODataResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// How strictly an entity payload is checked against its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityValidation {
    /// Full entity: every non-nullable property must be present
    Complete,
    /// Partial update: only the supplied properties are checked
    Partial,
}

/// Read-only metadata model of one service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdmModel {
    namespace: String,
    entity_types: BTreeMap<String, EntityType>,
    complex_types: BTreeMap<String, ComplexType>,
    entity_sets: BTreeMap<String, EntitySet>,
    operations: BTreeMap<String, Vec<Operation>>,
}

impl EdmModel {
    pub fn builder(namespace: impl Into<String>) -> EdmModelBuilder {
        EdmModelBuilder::new(namespace)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Strip this model's namespace from a qualified name.
    pub fn unqualified<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(name)
    }

    pub fn resolve_entity_type(&self, name: &str) -> ODataResult<&EntityType> {
        self.entity_types
            .get(self.unqualified(name))
            .ok_or_else(|| ODataError::not_found(format!("entity type {}", name)))
    }

    pub fn resolve_complex_type(&self, name: &str) -> ODataResult<&ComplexType> {
        self.complex_types
            .get(self.unqualified(name))
            .ok_or_else(|| ODataError::not_found(format!("complex type {}", name)))
    }

    pub fn entity_set(&self, name: &str) -> ODataResult<&EntitySet> {
        self.entity_sets
            .get(name)
            .ok_or_else(|| ODataError::not_found(name.to_string()))
    }

    pub fn entity_sets(&self) -> impl Iterator<Item = &EntitySet> {
        self.entity_sets.values()
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.values()
    }

    /// Every declared operation, grouped by name.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values().flatten()
    }

    /// All overloads declared under `name`.
    pub fn operations_named(&self, name: &str) -> &[Operation] {
        self.operations
            .get(self.unqualified(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_operation(&self, name: &str) -> bool {
        !self.operations_named(name).is_empty()
    }

    /// Resolve an operation by name and (optional) bound entity type.
    ///
    /// With `bound_type == None` only unbound operations are considered. When
    /// several overloads qualify the first declared one is returned; use
    /// [`resolve_overload`](Self::resolve_overload) when arguments are known.
    pub fn resolve_operation(&self, name: &str, bound_type: Option<&str>) -> ODataResult<&Operation> {
        let bound_type = bound_type.map(|t| self.unqualified(t));
        self.operations_named(name)
            .iter()
            .find(|op| op.binding.bound_type() == bound_type)
            .ok_or_else(|| ODataError::not_found(format!("operation {}", name)))
    }

    /// Resolve an overload by binding and supplied parameter names.
    pub fn resolve_overload(
        &self,
        name: &str,
        binding: &OperationBinding,
        parameter_names: &[&str],
    ) -> ODataResult<&Operation> {
        self.resolve_overload_with(name, binding, parameter_names, |_| true)
    }

    /// Resolve an overload by binding, supplied parameter names, and argument types.
    ///
    /// `arguments_fit` reports whether the supplied arguments conform to a
    /// candidate's parameter types. It is consulted only when several overloads
    /// accept the parameter names.
    pub fn resolve_overload_with<F>(
        &self,
        name: &str,
        binding: &OperationBinding,
        parameter_names: &[&str],
        arguments_fit: F,
    ) -> ODataResult<&Operation>
    where
        F: Fn(&Operation) -> bool,
    {
        let binding = self.normalized_binding(binding.clone());
        let candidates: Vec<&Operation> = self
            .operations_named(name)
            .iter()
            .filter(|op| op.binding == binding)
            .collect();

        let no_match = || {
            ODataError::invalid_parameter(
                name,
                parameter_names.join(","),
                "no overload accepts these parameters",
            )
        };
        match candidates.as_slice() {
            [] => Err(ODataError::not_found(format!("operation {}", name))),
            [only] => Ok(only),
            many => {
                let by_name: Vec<&Operation> = many
                    .iter()
                    .copied()
                    .filter(|op| op.accepts_parameter_names(parameter_names.iter().copied()))
                    .collect();
                match by_name.as_slice() {
                    [] => Err(no_match()),
                    [only] => Ok(only),
                    typed => typed
                        .iter()
                        .copied()
                        .find(|op| arguments_fit(op))
                        .ok_or_else(no_match),
                }
            }
        }
    }

    /// Binding with its bound type name stripped of the model namespace.
    pub fn normalized_binding(&self, binding: OperationBinding) -> OperationBinding {
        match binding {
            OperationBinding::Unbound => OperationBinding::Unbound,
            OperationBinding::Entity(t) => OperationBinding::Entity(self.unqualified(&t).to_string()),
            OperationBinding::EntityCollection(t) => {
                OperationBinding::EntityCollection(self.unqualified(&t).to_string())
            }
        }
    }

    /// Check that `key` has the arity, names, and types of the entity type's key.
    pub fn validate_key(&self, entity_type: &EntityType, key: &EntityKey) -> ODataResult<()> {
        if key.len() != entity_type.key.len() {
            return Err(ODataError::invalid_key(
                &entity_type.name,
                format!(
                    "expected {} key properties, got {}",
                    entity_type.key.len(),
                    key.len()
                ),
            ));
        }

        for ((name, value), property) in key.parts().iter().zip(entity_type.key_properties()) {
            if name != &property.name {
                return Err(ODataError::invalid_key(
                    &entity_type.name,
                    format!("expected key property '{}', got '{}'", property.name, name),
                ));
            }
            let kind = property.primitive_kind().ok_or_else(|| {
                ODataError::internal(format!("key property {} is not primitive", name))
            })?;
            KeyValue::from_json(kind, &value.to_json())
                .map_err(|reason| ODataError::invalid_key(&entity_type.name, reason))?;
        }
        Ok(())
    }

    /// Parse a key predicate's raw arguments into a validated key.
    ///
    /// `arguments` is either a single unnamed literal (single-property keys) or
    /// `name=literal` pairs in any order.
    pub fn parse_key(
        &self,
        entity_type: &EntityType,
        arguments: &[(Option<String>, String)],
    ) -> ODataResult<EntityKey> {
        let key_properties: Vec<_> = entity_type.key_properties().collect();
        if arguments.len() != key_properties.len() {
            return Err(ODataError::invalid_key(
                &entity_type.name,
                format!(
                    "expected {} key values, got {}",
                    key_properties.len(),
                    arguments.len()
                ),
            ));
        }

        let mut parts = Vec::with_capacity(key_properties.len());
        for property in key_properties {
            let literal = match arguments {
                [(None, literal)] => literal,
                _ => arguments
                    .iter()
                    .find(|(name, _)| name.as_deref() == Some(property.name.as_str()))
                    .map(|(_, literal)| literal)
                    .ok_or_else(|| {
                        ODataError::invalid_key(
                            &entity_type.name,
                            format!("missing key property '{}'", property.name),
                        )
                    })?,
            };
            let kind = property.primitive_kind().ok_or_else(|| {
                ODataError::internal(format!("key property {} is not primitive", property.name))
            })?;
            let value = KeyValue::parse_literal(kind, literal)
                .map_err(|reason| ODataError::invalid_key(&entity_type.name, reason))?;
            parts.push((property.name.clone(), value));
        }
        Ok(EntityKey::new(parts))
    }

    /// Derive the key of an entity payload.
    pub fn extract_key(
        &self,
        entity_type: &EntityType,
        properties: &Map<String, Value>,
    ) -> ODataResult<EntityKey> {
        let mut parts = Vec::with_capacity(entity_type.key.len());
        for property in entity_type.key_properties() {
            let value = properties.get(&property.name).ok_or_else(|| {
                ODataError::invalid_key(
                    &entity_type.name,
                    format!("missing key property '{}'", property.name),
                )
            })?;
            let kind = property.primitive_kind().ok_or_else(|| {
                ODataError::internal(format!("key property {} is not primitive", property.name))
            })?;
            let key_value = KeyValue::from_json(kind, value).map_err(|reason| {
                ODataError::invalid_key(&entity_type.name, format!("{}: {}", property.name, reason))
            })?;
            parts.push((property.name.clone(), key_value));
        }
        Ok(EntityKey::new(parts))
    }

    /// Check an entity payload against its entity type.
    pub fn validate_entity(
        &self,
        entity_type: &EntityType,
        properties: &Map<String, Value>,
        mode: EntityValidation,
    ) -> ODataResult<()> {
        for (name, value) in properties {
            if name.starts_with('@') {
                continue;
            }
            let property = entity_type.property(name).ok_or_else(|| {
                ODataError::validation(
                    name,
                    format!("not a property of entity type '{}'", entity_type.name),
                )
            })?;
            self.validate_value(name, &property.property_type, property.nullable, value)?;
            if let (Some(max), Some(text)) = (property.max_length, value.as_str()) {
                if text.chars().count() > max {
                    return Err(ODataError::validation(
                        name,
                        format!("exceeds maximum length {}", max),
                    ));
                }
            }
        }

        if mode == EntityValidation::Complete {
            if let Some(missing) = entity_type
                .properties
                .iter()
                .find(|p| !p.nullable && !properties.contains_key(&p.name))
            {
                return Err(ODataError::validation(
                    &missing.name,
                    "non-nullable property is missing",
                ));
            }
        }
        Ok(())
    }

    /// Check one value against a property or parameter type.
    pub fn validate_value(
        &self,
        name: &str,
        property_type: &PropertyType,
        nullable: bool,
        value: &Value,
    ) -> ODataResult<()> {
        if value.is_null() {
            return if nullable {
                Ok(())
            } else {
                Err(ODataError::validation(name, "value cannot be null"))
            };
        }

        match property_type {
            PropertyType::Primitive(kind) => kind
                .validate(value)
                .map_err(|reason| ODataError::validation(name, reason)),
            PropertyType::Complex(type_name) => {
                let complex = self.resolve_complex_type(type_name)?;
                let object = value.as_object().ok_or_else(|| {
                    ODataError::validation(
                        name,
                        format!("expected {}, got {}", type_name, json_type_name(value)),
                    )
                })?;
                self.validate_complex(name, complex, object)
            }
        }
    }

    /// Check a complex value; all members must be declared.
    pub fn validate_complex(
        &self,
        name: &str,
        complex: &ComplexType,
        object: &Map<String, Value>,
    ) -> ODataResult<()> {
        for (member, value) in object {
            if member.starts_with('@') {
                continue;
            }
            let property = complex.property(member).ok_or_else(|| {
                ODataError::validation(
                    format!("{}/{}", name, member),
                    format!("not a property of complex type '{}'", complex.name),
                )
            })?;
            self.validate_value(
                &format!("{}/{}", name, member),
                &property.property_type,
                property.nullable,
                value,
            )?;
        }
        Ok(())
    }
}

/// Builder for [`EdmModel`]. All consistency checks run in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct EdmModelBuilder {
    namespace: String,
    entity_types: Vec<EntityType>,
    complex_types: Vec<ComplexType>,
    entity_sets: Vec<EntitySet>,
    operations: Vec<Operation>,
}

impl EdmModelBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_types.push(entity_type);
        self
    }

    pub fn complex_type(mut self, complex_type: ComplexType) -> Self {
        self.complex_types.push(complex_type);
        self
    }

    pub fn entity_set(mut self, entity_set: EntitySet) -> Self {
        self.entity_sets.push(entity_set);
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Validate and freeze the model.
    pub fn build(self) -> EdmResult<EdmModel> {
        let mut complex_types = BTreeMap::new();
        for complex in self.complex_types {
            if complex_types.contains_key(&complex.name) {
                return Err(EdmError::Duplicate {
                    element: "complex type",
                    name: complex.name,
                });
            }
            complex_types.insert(complex.name.clone(), complex);
        }

        let mut entity_types = BTreeMap::new();
        for entity_type in self.entity_types {
            if entity_types.contains_key(&entity_type.name) {
                return Err(EdmError::Duplicate {
                    element: "entity type",
                    name: entity_type.name,
                });
            }
            entity_types.insert(entity_type.name.clone(), entity_type);
        }

        let mut model = EdmModel {
            namespace: self.namespace,
            entity_types,
            complex_types,
            entity_sets: BTreeMap::new(),
            operations: BTreeMap::new(),
        };

        for complex in model.complex_types.values() {
            for property in &complex.properties {
                model.check_property_type(&complex.name, &property.property_type)?;
            }
        }
        for entity_type in model.entity_types.values() {
            model.check_entity_type(entity_type)?;
        }

        for entity_set in self.entity_sets {
            model.check_entity_set(&entity_set)?;
            if model.entity_sets.contains_key(&entity_set.name) {
                return Err(EdmError::Duplicate {
                    element: "entity set",
                    name: entity_set.name,
                });
            }
            model.entity_sets.insert(entity_set.name.clone(), entity_set);
        }
        for entity_set in model.entity_sets.values() {
            for (navigation, target) in &entity_set.navigation_bindings {
                if model.binding_target(entity_set, navigation).is_none() {
                    return Err(EdmError::InvalidBinding {
                        entity_set: entity_set.name.clone(),
                        navigation: navigation.clone(),
                        target: target.clone(),
                        reason: "target entity set is missing or of another type".to_string(),
                    });
                }
            }
        }

        for mut operation in self.operations {
            operation.binding = model.normalized_binding(operation.binding);
            model.check_operation(&operation)?;
            model
                .operations
                .entry(operation.name.clone())
                .or_default()
                .push(operation);
        }

        Ok(model)
    }
}

impl EdmModel {
    fn check_property_type(&self, owner: &str, property_type: &PropertyType) -> EdmResult<()> {
        match property_type {
            PropertyType::Primitive(_) => Ok(()),
            PropertyType::Complex(name) => {
                if self.complex_types.contains_key(self.unqualified(name)) {
                    Ok(())
                } else {
                    Err(EdmError::UnknownType {
                        owner: owner.to_string(),
                        type_name: name.clone(),
                    })
                }
            }
        }
    }

    fn check_entity_type(&self, entity_type: &EntityType) -> EdmResult<()> {
        if entity_type.key.is_empty() {
            return Err(EdmError::MissingKey {
                entity_type: entity_type.name.clone(),
            });
        }

        let mut seen = HashSet::new();
        for property in &entity_type.properties {
            if !seen.insert(property.name.as_str()) {
                return Err(EdmError::Duplicate {
                    element: "property",
                    name: format!("{}/{}", entity_type.name, property.name),
                });
            }
            self.check_property_type(&entity_type.name, &property.property_type)?;
        }

        for key_name in &entity_type.key {
            let property = entity_type
                .property(key_name)
                .ok_or_else(|| EdmError::UnknownKeyProperty {
                    entity_type: entity_type.name.clone(),
                    property: key_name.clone(),
                })?;
            let key_capable = property
                .primitive_kind()
                .map(|kind| kind.is_key_capable())
                .unwrap_or(false);
            if property.nullable || !key_capable {
                return Err(EdmError::InvalidKeyProperty {
                    entity_type: entity_type.name.clone(),
                    property: key_name.clone(),
                });
            }
        }

        for navigation in &entity_type.navigation_properties {
            let target = self
                .entity_types
                .get(self.unqualified(&navigation.target_type))
                .ok_or_else(|| EdmError::UnknownType {
                    owner: format!("{}/{}", entity_type.name, navigation.name),
                    type_name: navigation.target_type.clone(),
                })?;

            if let Some(partner_name) = &navigation.partner {
                let points_back = target.navigation(partner_name).is_some_and(|partner| {
                    self.unqualified(&partner.target_type) == entity_type.name
                        && partner
                            .partner
                            .as_ref()
                            .is_none_or(|back| back == &navigation.name)
                });
                if !points_back {
                    return Err(EdmError::InconsistentPartner {
                        entity_type: entity_type.name.clone(),
                        navigation: navigation.name.clone(),
                        partner: partner_name.clone(),
                    });
                }
            }

            for constraint in &navigation.referential_constraints {
                let missing = if entity_type.property(&constraint.property).is_none() {
                    Some(&constraint.property)
                } else if target.property(&constraint.referenced_property).is_none() {
                    Some(&constraint.referenced_property)
                } else {
                    None
                };
                if let Some(property) = missing {
                    return Err(EdmError::UnknownConstraintProperty {
                        entity_type: entity_type.name.clone(),
                        navigation: navigation.name.clone(),
                        property: property.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_entity_set(&self, entity_set: &EntitySet) -> EdmResult<()> {
        let entity_type = self
            .entity_types
            .get(self.unqualified(&entity_set.entity_type))
            .ok_or_else(|| EdmError::UnknownType {
                owner: entity_set.name.clone(),
                type_name: entity_set.entity_type.clone(),
            })?;

        for (navigation_name, target_set) in &entity_set.navigation_bindings {
            let invalid = |reason: &str| EdmError::InvalidBinding {
                entity_set: entity_set.name.clone(),
                navigation: navigation_name.clone(),
                target: target_set.clone(),
                reason: reason.to_string(),
            };
            let navigation = entity_type
                .navigation(navigation_name)
                .ok_or_else(|| invalid("no such navigation property"))?;
            if !self
                .entity_types
                .contains_key(self.unqualified(&navigation.target_type))
            {
                return Err(invalid("unknown navigation target type"));
            }
        }
        Ok(())
    }

    fn check_operation(&self, operation: &Operation) -> EdmResult<()> {
        let mut seen = HashSet::new();
        for parameter in &operation.parameters {
            if !seen.insert(parameter.name.as_str()) {
                return Err(EdmError::DuplicateParameter {
                    operation: operation.name.clone(),
                    parameter: parameter.name.clone(),
                });
            }
            self.check_property_type(&operation.name, &parameter.parameter_type)?;
        }

        if let Some(bound) = operation.binding.bound_type() {
            self.require_entity_type(&operation.name, bound)?;
        }

        match &operation.return_type {
            Some(ReturnType::Complex(name)) | Some(ReturnType::ComplexCollection(name)) => {
                self.check_property_type(&operation.name, &PropertyType::Complex(name.clone()))?;
            }
            Some(ReturnType::Entity(name)) | Some(ReturnType::EntityCollection(name)) => {
                self.require_entity_type(&operation.name, name)?;
            }
            _ => {}
        }

        // Overloads must differ in parameter names or in parameter types
        let ambiguous = self.operations_named(&operation.name).iter().any(|other| {
            other.binding == operation.binding
                && other.parameters.len() == operation.parameters.len()
                && other.parameters.iter().all(|p| {
                    operation
                        .parameter(&p.name)
                        .is_some_and(|own| own.parameter_type == p.parameter_type)
                })
        });
        if ambiguous {
            return Err(EdmError::AmbiguousOverload {
                operation: operation.name.clone(),
            });
        }
        Ok(())
    }

    fn require_entity_type(&self, owner: &str, name: &str) -> EdmResult<()> {
        if self.entity_types.contains_key(self.unqualified(name)) {
            Ok(())
        } else {
            Err(EdmError::UnknownType {
                owner: owner.to_string(),
                type_name: name.to_string(),
            })
        }
    }

    /// Entity set a navigation binding points at, if it holds the navigation's target type.
    pub fn binding_target(&self, entity_set: &EntitySet, navigation: &str) -> Option<&EntitySet> {
        let target = self.entity_sets.get(entity_set.navigation_bindings.get(navigation)?)?;
        let entity_type = self.entity_types.get(self.unqualified(&entity_set.entity_type))?;
        let expected = self.unqualified(&entity_type.navigation(navigation)?.target_type);
        (self.unqualified(&target.entity_type) == expected).then_some(target)
    }

    /// Entity sets whose entity type is `type_name`, by name.
    pub fn entity_sets_of_type(&self, type_name: &str) -> HashMap<&str, &EntitySet> {
        let type_name = self.unqualified(type_name);
        self.entity_sets
            .values()
            .filter(|set| self.unqualified(&set.entity_type) == type_name)
            .map(|set| (set.name.as_str(), set))
            .collect()
    }
}
