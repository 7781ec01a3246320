//! Transport-neutral HTTP request and response values.
//!
//! The host HTTP server converts its own request type into an [`ODataRequest`]
//! and writes the returned [`ODataResponse`]. Batch parts are decoded into the
//! same types, so a batch part and a top-level request take the same path
//! through the handler.

use bytes::Bytes;
use ::http::{Method, StatusCode};
use std::fmt;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_ID: &str = "Content-ID";
pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
pub const ODATA_VERSION: &str = "OData-Version";
pub const LOCATION: &str = "Location";
pub const ETAG: &str = "ETag";
pub const IF_MATCH: &str = "If-Match";

/// Ordered header list with case-insensitive lookup.
///
/// Names keep the casing they were inserted with; the batch wire format is
/// compared byte for byte by some clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value of the header `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace all values of `name` with one value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter().position(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(index) => {
                self.0[index].1 = value;
                let mut seen = false;
                self.0.retain(|(n, _)| {
                    if !n.eq_ignore_ascii_case(&name) {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.0.push((name, value)),
        }
    }

    /// Append a value, keeping existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare as sets of `(lower-case name, value)` pairs.
    pub fn equivalent(&self, other: &Headers) -> bool {
        let normalize = |h: &Headers| {
            let mut pairs: Vec<(String, String)> = h
                .0
                .iter()
                .map(|(n, v)| (n.to_ascii_lowercase(), v.clone()))
                .collect();
            pairs.sort();
            pairs
        };
        normalize(self) == normalize(other)
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        )
    }
}

/// One HTTP request addressed to the service.
#[derive(Debug, Clone)]
pub struct ODataRequest {
    pub method: Method,
    /// Request target as received: absolute URI, or path relative to the service root
    pub uri: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl ODataRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON body with a matching content type.
    pub fn with_json(self, value: &serde_json::Value) -> Self {
        self.with_header(CONTENT_TYPE, "application/json")
            .with_body(value.to_string())
    }
}

/// One HTTP response produced by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ODataResponse {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Bytes,
}

impl ODataResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Set the body and its `Content-Type`/`Content-Length` headers.
    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.headers.set(CONTENT_TYPE, content_type);
        self.headers.set(CONTENT_LENGTH, self.body.len().to_string());
        self
    }

    /// Body as UTF-8 text, lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON.
    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

impl fmt::Display for ODataResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", status_line(self.status))
    }
}

/// `HTTP/1.1 <code> <reason>` for a status.
pub fn status_line(status: StatusCode) -> String {
    format!(
        "HTTP/1.1 {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    )
}
