//! Core EDM type definitions.
//!
//! Entity types, complex types, entity sets, and operation signatures. These are
//! plain data; consistency checks live in the model builder.

use super::annotation::Annotation;
use super::primitive::PrimitiveKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Type of a structural property or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyType {
    Primitive(PrimitiveKind),
    /// Reference to a complex type by unqualified name
    Complex(String),
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{}", kind),
            Self::Complex(name) => f.write_str(name),
        }
    }
}

/// Kind of content produced by a legacy feed-customization mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    Text,
    Html,
    Xhtml,
}

/// Legacy feed-mapping metadata. Carried opaquely, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMapping {
    pub source_path: Option<String>,
    pub target_path: Option<String>,
    pub content_kind: Option<ContentKind>,
    pub ns_prefix: Option<String>,
    pub ns_uri: Option<String>,
    pub keep_in_content: bool,
}

/// A structural property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_mapping: Option<ContentMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl Property {
    /// Nullable primitive property.
    pub fn primitive(name: impl Into<String>, kind: PrimitiveKind) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Primitive(kind),
            nullable: true,
            max_length: None,
            content_mapping: None,
            annotations: Vec::new(),
        }
    }

    /// Nullable property of a complex type.
    pub fn complex(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            property_type: PropertyType::Complex(type_name.into()),
            ..Self::primitive(name, PrimitiveKind::String)
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_content_mapping(mut self, mapping: ContentMapping) -> Self {
        self.content_mapping = Some(mapping);
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.property_type {
            PropertyType::Primitive(kind) => Some(kind),
            PropertyType::Complex(_) => None,
        }
    }
}

/// Cardinality of a navigation property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Multiplicity {
    One,
    ZeroOrOne,
    Many,
}

impl Multiplicity {
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Many)
    }
}

/// Pairs a property of the source entity with a property of the target entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferentialConstraint {
    pub property: String,
    pub referenced_property: String,
}

/// Typed relationship to another entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationProperty {
    pub name: String,
    pub target_type: String,
    pub multiplicity: Multiplicity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referential_constraints: Vec<ReferentialConstraint>,
}

impl NavigationProperty {
    pub fn new(
        name: impl Into<String>,
        target_type: impl Into<String>,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
            multiplicity,
            partner: None,
            referential_constraints: Vec::new(),
        }
    }

    pub fn with_partner(mut self, partner: impl Into<String>) -> Self {
        self.partner = Some(partner.into());
        self
    }

    pub fn with_constraint(
        mut self,
        property: impl Into<String>,
        referenced_property: impl Into<String>,
    ) -> Self {
        self.referential_constraints.push(ReferentialConstraint {
            property: property.into(),
            referenced_property: referenced_property.into(),
        });
        self
    }
}

/// Structured type without identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexType {
    pub name: String,
    pub properties: Vec<Property>,
}

impl ComplexType {
    pub fn new(name: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Entity type: properties, key, and navigation properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityType {
    pub name: String,
    pub properties: Vec<Property>,
    pub key: Vec<String>,
    #[serde(default)]
    pub navigation_properties: Vec<NavigationProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            key: Vec::new(),
            navigation_properties: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Add a non-nullable primitive property and append it to the key.
    pub fn with_key_property(mut self, name: impl Into<String>, kind: PrimitiveKind) -> Self {
        let name = name.into();
        self.key.push(name.clone());
        self.properties
            .push(Property::primitive(name, kind).not_null());
        self
    }

    pub fn with_navigation(mut self, navigation: NavigationProperty) -> Self {
        self.navigation_properties.push(navigation);
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn navigation(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation_properties.iter().find(|n| n.name == name)
    }

    /// Key properties in key order. Only valid on a built model.
    pub fn key_properties(&self) -> impl Iterator<Item = &Property> {
        self.key.iter().filter_map(|name| self.property(name))
    }

    pub fn is_key_property(&self, name: &str) -> bool {
        self.key.iter().any(|k| k == name)
    }
}

/// Named, addressable collection of entities of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySet {
    pub name: String,
    pub entity_type: String,
    /// Navigation property name -> target entity set name
    #[serde(default)]
    pub navigation_bindings: BTreeMap<String, String>,
}

impl EntitySet {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            navigation_bindings: BTreeMap::new(),
        }
    }

    pub fn with_binding(mut self, navigation: impl Into<String>, target: impl Into<String>) -> Self {
        self.navigation_bindings
            .insert(navigation.into(), target.into());
        self
    }
}

/// Side-effect classification of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// May have side effects; invoked with POST
    Action,
    /// Side-effect free; invoked with GET
    Function,
}

impl OperationKind {
    pub fn http_method(&self) -> http::Method {
        match self {
            Self::Action => http::Method::POST,
            Self::Function => http::Method::GET,
        }
    }
}

/// Operation parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: PropertyType,
    pub nullable: bool,
}

impl Parameter {
    /// Non-nullable primitive parameter.
    pub fn primitive(name: impl Into<String>, kind: PrimitiveKind) -> Self {
        Self {
            name: name.into(),
            parameter_type: PropertyType::Primitive(kind),
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// What an operation is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationBinding {
    Unbound,
    Entity(String),
    EntityCollection(String),
}

impl OperationBinding {
    pub fn bound_type(&self) -> Option<&str> {
        match self {
            Self::Unbound => None,
            Self::Entity(t) | Self::EntityCollection(t) => Some(t),
        }
    }
}

/// Declared return type of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnType {
    Primitive(PrimitiveKind),
    PrimitiveCollection(PrimitiveKind),
    Complex(String),
    ComplexCollection(String),
    Entity(String),
    EntityCollection(String),
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{}", kind),
            Self::PrimitiveCollection(kind) => write!(f, "Collection({})", kind),
            Self::Complex(name) | Self::Entity(name) => f.write_str(name),
            Self::ComplexCollection(name) | Self::EntityCollection(name) => {
                write!(f, "Collection({})", name)
            }
        }
    }
}

/// Action or function signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    pub kind: OperationKind,
    pub parameters: Vec<Parameter>,
    pub binding: OperationBinding,
    pub return_type: Option<ReturnType>,
    /// Entity set that entity results belong to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_set: Option<String>,
}

impl Operation {
    pub fn action(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Action)
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Function)
    }

    fn new(name: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parameters: Vec::new(),
            binding: OperationBinding::Unbound,
            return_type: None,
            entity_set: None,
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn bound_to(mut self, binding: OperationBinding) -> Self {
        self.binding = binding;
        self
    }

    pub fn returns(mut self, return_type: ReturnType) -> Self {
        self.return_type = Some(return_type);
        self
    }

    pub fn in_entity_set(mut self, entity_set: impl Into<String>) -> Self {
        self.entity_set = Some(entity_set.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Whether a call supplying exactly `names` can bind to this signature.
    pub fn accepts_parameter_names<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        let names: Vec<&str> = names.into_iter().collect();
        names.iter().all(|n| self.parameter(n).is_some())
            && self
                .parameters
                .iter()
                .filter(|p| !p.nullable)
                .all(|p| names.contains(&p.name.as_str()))
    }
}
