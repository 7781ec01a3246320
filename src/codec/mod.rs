//! Pluggable wire formats for entity and property payloads.
//!
//! The handler builds a format-neutral [`Payload`] and asks the configured
//! [`FormatCodec`] to encode it. Request bodies are decoded into JSON objects,
//! which is the value representation the rest of the engine works on.

pub mod json;

pub use json::JsonCodec;

use crate::error::{ODataError, ODataResult};
use bytes::Bytes;
use serde_json::{Map, Value};

/// Format-neutral response payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// One entity; `context` is the metadata fragment, e.g. `ESAllPrim/$entity`
    Entity {
        context: String,
        entity: Map<String, Value>,
    },
    EntityCollection {
        context: String,
        entities: Vec<Map<String, Value>>,
    },
    /// Single primitive value, possibly null
    Property { context: String, value: Value },
    /// Collection of primitive or complex values
    Collection { context: String, items: Vec<Value> },
    Complex {
        context: String,
        value: Map<String, Value>,
    },
    /// Service document: names of entity sets and unbound functions
    ServiceDocument {
        entity_sets: Vec<String>,
        function_imports: Vec<String>,
    },
    /// Rendered model
    Metadata(Value),
}

/// Encoder/decoder for one wire format.
pub trait FormatCodec: Send + Sync {
    /// `Content-Type` of encoded payloads.
    fn content_type(&self) -> &str;

    /// Decode a request body into an object.
    fn decode_object(&self, body: &[u8]) -> ODataResult<Map<String, Value>>;

    /// Encode a response payload. `service_root` ends with `/`.
    fn encode(&self, service_root: &str, payload: &Payload) -> ODataResult<Bytes>;

    /// Encode an error as the structured error body.
    fn encode_error(&self, error: &ODataError) -> Bytes;
}
