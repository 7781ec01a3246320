//! JSON format (`odata.metadata=minimal`).

use super::{FormatCodec, Payload};
use crate::error::{ODataError, ODataResult};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value, json};

pub const JSON_CONTENT_TYPE: &str = "application/json;odata.metadata=minimal";

const CONTEXT: &str = "@odata.context";

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
}

/// JSON codec with minimal metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }

    fn with_context(service_root: &str, context: &str, mut members: Map<String, Value>) -> Value {
        let mut object = Map::with_capacity(members.len() + 1);
        object.insert(
            CONTEXT.to_string(),
            Value::String(format!("{}$metadata#{}", service_root, context)),
        );
        object.append(&mut members);
        Value::Object(object)
    }

    fn value_member(value: Value) -> Map<String, Value> {
        let mut members = Map::new();
        members.insert("value".to_string(), value);
        members
    }
}

impl FormatCodec for JsonCodec {
    fn content_type(&self) -> &str {
        JSON_CONTENT_TYPE
    }

    fn decode_object(&self, body: &[u8]) -> ODataResult<Map<String, Value>> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        match serde_json::from_slice(body)? {
            Value::Object(map) => Ok(map),
            other => Err(ODataError::bad_request(format!(
                "request body must be a JSON object, got {}",
                crate::edm::primitive::json_type_name(&other)
            ))),
        }
    }

    fn encode(&self, service_root: &str, payload: &Payload) -> ODataResult<Bytes> {
        let document = match payload {
            Payload::Entity { context, entity } => {
                Self::with_context(service_root, context, entity.clone())
            }
            Payload::Complex { context, value } => {
                Self::with_context(service_root, context, value.clone())
            }
            Payload::EntityCollection { context, entities } => {
                let items = entities.iter().cloned().map(Value::Object).collect();
                Self::with_context(
                    service_root,
                    context,
                    Self::value_member(Value::Array(items)),
                )
            }
            Payload::Property { context, value } => {
                Self::with_context(service_root, context, Self::value_member(value.clone()))
            }
            Payload::Collection { context, items } => Self::with_context(
                service_root,
                context,
                Self::value_member(Value::Array(items.clone())),
            ),
            Payload::ServiceDocument {
                entity_sets,
                function_imports,
            } => {
                let entries: Vec<Value> = entity_sets
                    .iter()
                    .map(|name| json!({"name": name, "kind": "EntitySet", "url": name}))
                    .chain(function_imports.iter().map(
                        |name| json!({"name": name, "kind": "FunctionImport", "url": name}),
                    ))
                    .collect();
                json!({
                    CONTEXT: format!("{}$metadata", service_root),
                    "value": entries,
                })
            }
            Payload::Metadata(model) => model.clone(),
        };
        Ok(Bytes::from(serde_json::to_vec(&document)?))
    }

    fn encode_error(&self, error: &ODataError) -> Bytes {
        let body = ErrorBody {
            error: ErrorDetail {
                code: error.error_code(),
                message: error.to_string(),
                target: error.target(),
            },
        };
        // Serializing string fields cannot fail; fall back to a fixed body anyway.
        serde_json::to_vec(&body)
            .map(Bytes::from)
            .unwrap_or_else(|_| Bytes::from_static(br#"{"error":{"code":"INTERNAL_ERROR","message":"error"}}"#))
    }
}
