//! Fluent builders for batch requests and helpers for reading batch responses.

use super::url;
use odata_server::batch::{BatchFrame, BatchResponseFrame, extract_boundary, write_batch_request};
use odata_server::http::CONTENT_TYPE;
use odata_server::{BatchParser, ODataRequest, ODataResponse};

/// Builds a `$batch` request one frame at a time.
pub struct BatchBuilder {
    boundary: String,
    frames: Vec<BatchFrame>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::with_boundary("batch_36522ad7-fc75-4b56-8c71-56071383e77b")
    }

    pub fn with_boundary(boundary: &str) -> Self {
        Self {
            boundary: boundary.to_string(),
            frames: Vec::new(),
        }
    }

    pub fn get(mut self, uri: impl Into<String>) -> Self {
        self.frames.push(
            BatchFrame::new(http::Method::GET, uri).with_header("Accept", "application/json"),
        );
        self
    }

    pub fn frame(mut self, frame: BatchFrame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn frames(&self) -> &[BatchFrame] {
        &self.frames
    }

    pub fn build(self) -> ODataRequest {
        ODataRequest::post(url("$batch"))
            .with_header(
                CONTENT_TYPE,
                format!("multipart/mixed; boundary={}", self.boundary),
            )
            .with_body(write_batch_request(&self.boundary, &self.frames))
    }
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The response frames of a 202 batch response.
pub fn response_frames(response: &ODataResponse) -> Vec<BatchResponseFrame> {
    let content_type = response
        .headers
        .get(CONTENT_TYPE)
        .expect("batch response has a Content-Type");
    let boundary = extract_boundary(content_type).expect("batch response declares a boundary");
    BatchParser::new(&boundary)
        .parse_responses(&response.body)
        .expect("batch response parses")
}
