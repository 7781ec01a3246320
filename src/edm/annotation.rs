//! Vocabulary annotations attached to model elements.
//!
//! The expression language is modelled as a closed sum type. Consumers match on
//! [`AnnotationExpression`] directly; the engine carries annotations as metadata
//! and does not evaluate them.

use serde::{Deserialize, Serialize};

/// A term applied to a model element, optionally qualified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    pub expression: AnnotationExpression,
}

impl Annotation {
    pub fn new(term: impl Into<String>, expression: AnnotationExpression) -> Self {
        Self {
            term: term.into(),
            qualifier: None,
            expression,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }
}

/// Constant expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ConstantExpression {
    Binary(String),
    Bool(bool),
    Date(String),
    DateTimeOffset(String),
    Decimal(String),
    Duration(String),
    EnumMember(String),
    Float(f64),
    Guid(String),
    Int(i64),
    String(String),
    TimeOfDay(String),
}

/// Binary logical and comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwoParamsOperator {
    And,
    Or,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// One `property = value` pair of a record expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub property: String,
    pub value: AnnotationExpression,
}

/// Annotation expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expression")]
pub enum AnnotationExpression {
    Constant(ConstantExpression),
    Not {
        operand: Box<AnnotationExpression>,
    },
    TwoParamsOp {
        operator: TwoParamsOperator,
        left: Box<AnnotationExpression>,
        right: Box<AnnotationExpression>,
    },
    AnnotationPath {
        path: String,
    },
    Apply {
        function: String,
        arguments: Vec<AnnotationExpression>,
    },
    Cast {
        type_name: String,
        value: Box<AnnotationExpression>,
    },
    Collection {
        items: Vec<AnnotationExpression>,
    },
    If {
        guard: Box<AnnotationExpression>,
        then: Box<AnnotationExpression>,
        otherwise: Option<Box<AnnotationExpression>>,
    },
    IsOf {
        type_name: String,
        value: Box<AnnotationExpression>,
    },
    LabeledElement {
        name: String,
        value: Box<AnnotationExpression>,
    },
    LabeledElementReference {
        name: String,
    },
    Null,
    NavigationPropertyPath {
        path: String,
    },
    Path {
        path: String,
    },
    PropertyPath {
        path: String,
    },
    PropertyValue(Box<PropertyValue>),
    Record {
        type_name: Option<String>,
        properties: Vec<PropertyValue>,
    },
    UrlRef {
        url: Box<AnnotationExpression>,
    },
}

impl AnnotationExpression {
    /// Whether the expression is a constant (as opposed to a dynamic expression).
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    /// Direct sub-expressions, in declaration order.
    pub fn children(&self) -> Vec<&AnnotationExpression> {
        match self {
            Self::Not { operand } => vec![operand.as_ref()],
            Self::TwoParamsOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Self::Apply { arguments, .. } => arguments.iter().collect(),
            Self::Cast { value, .. }
            | Self::IsOf { value, .. }
            | Self::LabeledElement { value, .. } => vec![value.as_ref()],
            Self::Collection { items } => items.iter().collect(),
            Self::If {
                guard,
                then,
                otherwise,
            } => {
                let mut children = vec![guard.as_ref(), then.as_ref()];
                if let Some(otherwise) = otherwise {
                    children.push(otherwise.as_ref());
                }
                children
            }
            Self::PropertyValue(pv) => vec![&pv.value],
            Self::Record { properties, .. } => properties.iter().map(|p| &p.value).collect(),
            Self::UrlRef { url } => vec![url.as_ref()],
            Self::Constant(_)
            | Self::AnnotationPath { .. }
            | Self::LabeledElementReference { .. }
            | Self::Null
            | Self::NavigationPropertyPath { .. }
            | Self::Path { .. }
            | Self::PropertyPath { .. } => Vec::new(),
        }
    }

    /// Paths referenced anywhere inside the expression.
    pub fn referenced_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths<'a>(&'a self, paths: &mut Vec<&'a str>) {
        match self {
            Self::AnnotationPath { path }
            | Self::NavigationPropertyPath { path }
            | Self::Path { path }
            | Self::PropertyPath { path } => paths.push(path),
            _ => {}
        }
        for child in self.children() {
            child.collect_paths(paths);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_match_instead_of_predicates() {
        let expr = AnnotationExpression::If {
            guard: Box::new(AnnotationExpression::Path {
                path: "IsActive".into(),
            }),
            then: Box::new(AnnotationExpression::Constant(ConstantExpression::String(
                "yes".into(),
            ))),
            otherwise: Some(Box::new(AnnotationExpression::Null)),
        };

        match &expr {
            AnnotationExpression::If { guard, .. } => {
                assert!(matches!(**guard, AnnotationExpression::Path { .. }));
            }
            other => panic!("unexpected expression {:?}", other),
        }
        assert_eq!(expr.children().len(), 3);
        assert_eq!(expr.referenced_paths(), vec!["IsActive"]);
    }

    #[test]
    fn test_record_paths() {
        let expr = AnnotationExpression::Record {
            type_name: None,
            properties: vec![PropertyValue {
                property: "Label".into(),
                value: AnnotationExpression::Not {
                    operand: Box::new(AnnotationExpression::PropertyPath {
                        path: "Address/City".into(),
                    }),
                },
            }],
        };
        assert_eq!(expr.referenced_paths(), vec!["Address/City"]);
        assert!(!expr.is_constant());
    }
}
