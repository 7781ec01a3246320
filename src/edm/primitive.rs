//! EDM primitive types and value checking.
//!
//! Property values travel through the engine as `serde_json::Value`. This module
//! decides whether a JSON value is acceptable for a primitive kind and parses the
//! URI literal forms used in key predicates and function parameters.

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Primitive kinds of the Entity Data Model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    #[serde(rename = "Edm.Boolean")]
    Boolean,
    #[serde(rename = "Edm.Byte")]
    Byte,
    #[serde(rename = "Edm.SByte")]
    SByte,
    #[serde(rename = "Edm.Int16")]
    Int16,
    #[serde(rename = "Edm.Int32")]
    Int32,
    #[serde(rename = "Edm.Int64")]
    Int64,
    #[serde(rename = "Edm.Decimal")]
    Decimal,
    #[serde(rename = "Edm.Double")]
    Double,
    #[serde(rename = "Edm.Single")]
    Single,
    #[serde(rename = "Edm.String")]
    String,
    #[serde(rename = "Edm.Guid")]
    Guid,
    #[serde(rename = "Edm.Binary")]
    Binary,
    #[serde(rename = "Edm.Date")]
    Date,
    #[serde(rename = "Edm.DateTimeOffset")]
    DateTimeOffset,
    #[serde(rename = "Edm.TimeOfDay")]
    TimeOfDay,
    #[serde(rename = "Edm.Duration")]
    Duration,
}

impl PrimitiveKind {
    /// Qualified EDM name, e.g. `Edm.Int16`.
    pub fn qualified_name(&self) -> &'static str {
        match self {
            Self::Boolean => "Edm.Boolean",
            Self::Byte => "Edm.Byte",
            Self::SByte => "Edm.SByte",
            Self::Int16 => "Edm.Int16",
            Self::Int32 => "Edm.Int32",
            Self::Int64 => "Edm.Int64",
            Self::Decimal => "Edm.Decimal",
            Self::Double => "Edm.Double",
            Self::Single => "Edm.Single",
            Self::String => "Edm.String",
            Self::Guid => "Edm.Guid",
            Self::Binary => "Edm.Binary",
            Self::Date => "Edm.Date",
            Self::DateTimeOffset => "Edm.DateTimeOffset",
            Self::TimeOfDay => "Edm.TimeOfDay",
            Self::Duration => "Edm.Duration",
        }
    }

    /// Integral kinds and their inclusive value range.
    fn integral_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::Byte => Some((0, u8::MAX as i64)),
            Self::SByte => Some((i8::MIN as i64, i8::MAX as i64)),
            Self::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            Self::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    pub fn is_integral(&self) -> bool {
        self.integral_range().is_some()
    }

    /// Whether the kind may be used as (part of) an entity key.
    pub fn is_key_capable(&self) -> bool {
        !matches!(self, Self::Double | Self::Single | Self::Binary)
    }

    /// Check a JSON value against this kind. `null` is handled by the caller.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        if let Some((min, max)) = self.integral_range() {
            let n = value
                .as_i64()
                .ok_or_else(|| format!("expected {}, got {}", self, json_type_name(value)))?;
            if n < min || n > max {
                return Err(format!("{} is out of range for {}", n, self));
            }
            return Ok(());
        }

        match self {
            Self::Boolean => value
                .is_boolean()
                .then_some(())
                .ok_or_else(|| format!("expected {}, got {}", self, json_type_name(value))),
            Self::Decimal => match value {
                Value::Number(_) => Ok(()),
                Value::String(s) if s.parse::<f64>().is_ok() => Ok(()),
                _ => Err(format!("expected {}, got {}", self, json_type_name(value))),
            },
            Self::Double | Self::Single => match value {
                Value::Number(_) => Ok(()),
                Value::String(s) if matches!(s.as_str(), "NaN" | "INF" | "-INF") => Ok(()),
                _ => Err(format!("expected {}, got {}", self, json_type_name(value))),
            },
            _ => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("expected {}, got {}", self, json_type_name(value)))?;
                self.validate_text(text)
            }
        }
    }

    /// Check the textual form of string-encoded kinds.
    fn validate_text(&self, text: &str) -> Result<(), String> {
        let ok = match self {
            Self::String => true,
            Self::Guid => uuid::Uuid::parse_str(text).is_ok(),
            Self::Binary => is_valid_base64(text),
            Self::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok(),
            Self::DateTimeOffset => DateTime::parse_from_rfc3339(text).is_ok(),
            Self::TimeOfDay => is_valid_time_of_day(text),
            Self::Duration => is_valid_duration(text),
            _ => false,
        };
        ok.then_some(())
            .ok_or_else(|| format!("'{}' is not a valid {}", text, self))
    }

    /// Parse a URI literal (key predicate or inline function parameter) into a JSON value.
    pub fn parse_literal(&self, literal: &str) -> Result<Value, String> {
        let literal = literal.trim();
        if literal == "null" {
            return Ok(Value::Null);
        }

        let value = match self {
            Self::String => Value::String(unquote(literal).ok_or_else(|| {
                format!("string literal must be enclosed in single quotes: {}", literal)
            })?),
            Self::Boolean => match literal {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(format!("'{}' is not a valid {}", literal, self)),
            },
            Self::Byte | Self::SByte | Self::Int16 | Self::Int32 | Self::Int64 => {
                let n: i64 = literal
                    .parse()
                    .map_err(|_| format!("'{}' is not a valid {}", literal, self))?;
                Value::Number(n.into())
            }
            Self::Decimal | Self::Double | Self::Single => {
                if let Ok(n) = literal.parse::<i64>() {
                    Value::Number(n.into())
                } else {
                    let f: f64 = literal
                        .parse()
                        .map_err(|_| format!("'{}' is not a valid {}", literal, self))?;
                    Number::from_f64(f)
                        .map(Value::Number)
                        .ok_or_else(|| format!("'{}' is not a finite number", literal))?
                }
            }
            Self::Duration => Value::String(
                typed_literal(literal, "duration")
                    .unwrap_or(literal)
                    .to_string(),
            ),
            Self::Binary => Value::String(
                typed_literal(literal, "binary")
                    .unwrap_or(literal)
                    .to_string(),
            ),
            Self::Guid | Self::Date | Self::DateTimeOffset | Self::TimeOfDay => {
                Value::String(literal.to_string())
            }
        };

        self.validate(&value)?;
        Ok(value)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.qualified_name())
    }
}

/// Name of a JSON value's type for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() => "integer",
        Value::Number(_) => "decimal",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Strip single quotes from a string literal, collapsing doubled quotes.
pub(crate) fn unquote(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            // inner quotes must be doubled
            if chars.next_if_eq(&'\'').is_none() {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// Quote a string as a URI literal.
pub(crate) fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn typed_literal<'a>(literal: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = literal.get(..prefix.len())?;
    if !rest.eq_ignore_ascii_case(prefix) {
        return None;
    }
    literal[prefix.len()..]
        .strip_prefix('\'')?
        .strip_suffix('\'')
}

fn is_valid_base64(text: &str) -> bool {
    URL_SAFE.decode(text).is_ok()
        || URL_SAFE_NO_PAD.decode(text).is_ok()
        || STANDARD.decode(text).is_ok()
}

fn is_valid_time_of_day(text: &str) -> bool {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f").is_ok()
        || NaiveTime::parse_from_str(text, "%H:%M").is_ok()
}

/// Day-time duration in ISO 8601 form: `[-]P[nD][T[nH][nM][n[.n]S]]`.
pub(crate) fn is_valid_duration(text: &str) -> bool {
    let text = text.strip_prefix('-').unwrap_or(text);
    let Some(rest) = text.strip_prefix('P') else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }

    let (days, time) = match rest.split_once('T') {
        Some((days, time)) => (days, Some(time)),
        None => (rest, None),
    };

    if !days.is_empty() {
        match days.strip_suffix('D') {
            Some(n) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {}
            _ => return false,
        }
    }

    let Some(time) = time else {
        return true;
    };
    if time.is_empty() {
        return false;
    }

    let mut remaining = time;
    let mut seen = 0usize;
    for (index, designator) in ['H', 'M', 'S'].into_iter().enumerate() {
        let Some(pos) = remaining.find(designator) else {
            continue;
        };
        let number = &remaining[..pos];
        let valid = if designator == 'S' {
            let (whole, fraction) = number.split_once('.').unwrap_or((number, "0"));
            !whole.is_empty()
                && !fraction.is_empty()
                && whole.bytes().all(|b| b.is_ascii_digit())
                && fraction.bytes().all(|b| b.is_ascii_digit())
        } else {
            !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit())
        };
        if !valid || index < seen {
            return false;
        }
        seen = index + 1;
        remaining = &remaining[pos + 1..];
    }

    seen > 0 && remaining.is_empty()
}
