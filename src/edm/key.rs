//! Entity keys.
//!
//! An [`EntityKey`] is the ordered tuple of key property values of one entity.
//! Single and composite keys are the same type, so storage and lookup logic never
//! branch on key arity.

use super::primitive::{PrimitiveKind, quote};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// One component of an entity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyValue {
    Boolean(bool),
    Integer(i64),
    String(String),
    Guid(Uuid),
    Date(NaiveDate),
    /// Canonical literal text for the remaining key-capable kinds (decimal, temporal).
    Text(String),
}

impl KeyValue {
    /// Build a key component from a property value of the given kind.
    pub fn from_json(kind: PrimitiveKind, value: &Value) -> Result<Self, String> {
        if value.is_null() {
            return Err("key properties cannot be null".to_string());
        }
        kind.validate(value)?;

        let key = match kind {
            PrimitiveKind::Boolean => Self::Boolean(value.as_bool().unwrap_or_default()),
            k if k.is_integral() => Self::Integer(value.as_i64().unwrap_or_default()),
            PrimitiveKind::String => Self::String(value.as_str().unwrap_or_default().to_string()),
            PrimitiveKind::Guid => Self::Guid(
                Uuid::parse_str(value.as_str().unwrap_or_default()).map_err(|e| e.to_string())?,
            ),
            PrimitiveKind::Date => Self::Date(
                NaiveDate::parse_from_str(value.as_str().unwrap_or_default(), "%Y-%m-%d")
                    .map_err(|e| e.to_string())?,
            ),
            k if !k.is_key_capable() => {
                return Err(format!("{} cannot be used as a key", k));
            }
            _ => match value {
                Value::String(s) => Self::Text(s.clone()),
                other => Self::Text(other.to_string()),
            },
        };
        Ok(key)
    }

    /// Parse a key component from its URI literal form.
    pub fn parse_literal(kind: PrimitiveKind, literal: &str) -> Result<Self, String> {
        let value = kind.parse_literal(literal)?;
        Self::from_json(kind, &value)
    }

    /// JSON representation as stored in the entity payload.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(n) => Value::Number((*n).into()),
            Self::String(s) => Value::String(s.clone()),
            Self::Guid(g) => Value::String(g.to_string()),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::Text(t) => serde_json::from_str::<serde_json::Number>(t)
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(t.clone())),
        }
    }

    /// URI literal form, as used in key predicates.
    pub fn to_literal(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Integer(n) => n.to_string(),
            Self::String(s) => quote(s),
            Self::Guid(g) => g.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Text(t) => t.clone(),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

/// Ordered tuple of `(key property name, value)` pairs identifying an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey(Vec<(String, KeyValue)>);

impl EntityKey {
    pub fn new(parts: Vec<(String, KeyValue)>) -> Self {
        Self(parts)
    }

    /// Key with a single component.
    pub fn single(name: impl Into<String>, value: KeyValue) -> Self {
        Self(vec![(name.into(), value)])
    }

    pub fn parts(&self) -> &[(String, KeyValue)] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&KeyValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key predicate including parentheses: `(1)` or `(A=1,B='x')`.
    pub fn to_predicate(&self) -> String {
        match self.0.as_slice() {
            [(_, value)] => format!("({})", value.to_literal()),
            parts => {
                let inner: Vec<String> = parts
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value.to_literal()))
                    .collect();
                format!("({})", inner.join(","))
            }
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_predicate())
    }
}
