//! `$batch` protocol: multipart/mixed framing of independent sub-requests.
//!
//! A batch body is split into [`BatchFrame`]s by [`BatchParser`], each frame's
//! URI is checked against the service root by [`scope::validate_uri`], frames
//! are executed strictly in order through a [`RequestExecutor`], and the
//! [`BatchResponseFrame`]s are written back with the same boundary.
//!
//! Framing and scope errors abort the whole batch with a single 400 response;
//! per-frame business errors only affect their own response frame.
//!
//! # Examples
//!
//! ```rust
//! use odata_server::batch::{BatchParser, extract_boundary};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let boundary = extract_boundary("multipart/mixed; boundary=batch_1")?;
//! let body = "--batch_1\r\n\
//!             Content-Type: application/http\r\n\
//!             Content-Transfer-Encoding: binary\r\n\
//!             \r\n\
//!             GET ESAllPrim(32767) HTTP/1.1\r\n\
//!             \r\n\
//!             \r\n\
//!             --batch_1--\r\n";
//!
//! let frames = BatchParser::new(&boundary).parse_requests(body.as_bytes())?;
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].uri, "ESAllPrim(32767)");
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod parser;
pub mod processor;
pub mod scope;
pub mod writer;


pub use errors::{BatchError, BatchResult};
pub use parser::BatchParser;
pub use processor::{BatchProcessor, RequestExecutor};
pub use writer::{write_batch_request, write_batch_response};

use crate::http::{Headers, ODataRequest, ODataResponse};
use bytes::Bytes;
use http::{Method, StatusCode, Version};

pub const MULTIPART_MIXED: &str = "multipart/mixed";
pub const APPLICATION_HTTP: &str = "application/http";
pub const BINARY: &str = "binary";

/// One sub-request of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFrame {
    pub method: Method,
    /// Target exactly as written in the request line
    pub uri: String,
    pub headers: Headers,
    pub body: Bytes,
    /// `Content-ID` of the MIME part, if any
    pub content_id: Option<String>,
    /// Line of the request line within the batch body, 1-based
    pub line: usize,
}

impl BatchFrame {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Headers::new(),
            body: Bytes::new(),
            content_id: None,
            line: 0,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// Synthetic single request for `uri`.
    pub fn to_request(&self, uri: impl Into<String>) -> ODataRequest {
        ODataRequest {
            method: self.method.clone(),
            uri: uri.into(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// One sub-response of a batch, in the position of its request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResponseFrame {
    pub status: StatusCode,
    /// Protocol version named in the status line
    pub version: Version,
    /// Reason phrase, when it is not the default one for `status`
    pub reason: Option<String>,
    pub headers: Headers,
    pub body: Bytes,
    pub content_id: Option<String>,
}

impl BatchResponseFrame {
    /// An `HTTP/1.1` frame with the default reason phrase and no content.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            reason: None,
            headers: Headers::new(),
            body: Bytes::new(),
            content_id: None,
        }
    }

    pub fn from_response(response: ODataResponse, content_id: Option<String>) -> Self {
        Self {
            headers: response.headers,
            body: response.body,
            content_id,
            ..Self::new(response.status)
        }
    }

    pub fn reason_phrase(&self) -> &str {
        self.reason
            .as_deref()
            .unwrap_or_else(|| default_reason(self.status))
    }

    /// Status line as written, e.g. `HTTP/1.1 404 Not Found`.
    pub fn status_line(&self) -> String {
        format!(
            "{} {} {}",
            version_text(self.version),
            self.status.as_u16(),
            self.reason_phrase()
        )
    }
}

const VERSIONS: [(Version, &str); 5] = [
    (Version::HTTP_09, "HTTP/0.9"),
    (Version::HTTP_10, "HTTP/1.0"),
    (Version::HTTP_11, "HTTP/1.1"),
    (Version::HTTP_2, "HTTP/2"),
    (Version::HTTP_3, "HTTP/3"),
];

pub(crate) fn version_text(version: Version) -> &'static str {
    VERSIONS
        .iter()
        .find(|(known, _)| *known == version)
        .map_or("HTTP/1.1", |(_, text)| *text)
}

pub(crate) fn parse_version(text: &str) -> Option<Version> {
    VERSIONS
        .iter()
        .find(|(_, known)| *known == text)
        .map(|(version, _)| *version)
}

pub(crate) fn default_reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown")
}

/// Boundary token of a `multipart/mixed` content type.
///
/// Any other media type is unsupported; `multipart/mixed` without a usable
/// boundary is malformed framing.
pub fn extract_boundary(content_type: &str) -> BatchResult<String> {
    if media_type(content_type) != MULTIPART_MIXED {
        return Err(BatchError::UnsupportedMediaType {
            content_type: content_type.to_string(),
        });
    }

    content_type
        .split(';')
        .skip(1)
        .filter_map(|parameter| parameter.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty() && boundary.len() <= 70)
        .ok_or_else(|| BatchError::MissingBoundary {
            content_type: content_type.to_string(),
        })
}

/// Media type without parameters, lowercased.
pub(crate) fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
