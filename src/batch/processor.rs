//! Batch execution: parse, check scope, run frames in order, write responses.

use super::errors::BatchError;
use super::parser::BatchParser;
use super::scope::validate_uri;
use super::writer::write_batch_response;
use super::{BatchFrame, BatchResponseFrame, MULTIPART_MIXED, extract_boundary};
use crate::codec::FormatCodec;
use crate::config::{ScopeViolationPolicy, ServiceConfig};
use crate::error::{ODataError, ODataResult};
use crate::handler::error_response;
use crate::http::{CONTENT_TYPE, LOCATION, ODATA_VERSION, ODataRequest, ODataResponse};
use http::{Method, StatusCode};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::future::Future;

/// Executes one synthetic sub-request.
///
/// Implemented by [`ODataService`](crate::service::ODataService); tests and
/// embedders can supply their own.
pub trait RequestExecutor: Send + Sync {
    fn execute(&self, request: ODataRequest) -> impl Future<Output = ODataResponse> + Send;
}

/// A frame after scope checking.
enum Planned {
    Dispatch { frame: BatchFrame, uri: String },
    Fail { frame: BatchFrame, error: ODataError },
}

/// Processes one `$batch` request.
pub struct BatchProcessor<'a, E: RequestExecutor> {
    executor: &'a E,
    config: &'a ServiceConfig,
    codec: &'a dyn FormatCodec,
    batch_id: String,
}

impl<'a, E: RequestExecutor> BatchProcessor<'a, E> {
    pub fn new(executor: &'a E, config: &'a ServiceConfig, codec: &'a dyn FormatCodec) -> Self {
        Self {
            executor,
            config,
            codec,
            batch_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Produce the outer response: 202 with one frame per sub-request, or a
    /// single 400 when the batch is malformed or out of scope.
    pub async fn process(&self, request: &ODataRequest) -> ODataResponse {
        match self.try_process(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Batch aborted: {} (batch: '{}')", e, self.batch_id);
                error_response(self.codec, self.config, &e)
            }
        }
    }

    async fn try_process(&self, request: &ODataRequest) -> ODataResult<ODataResponse> {
        if request.method != Method::POST {
            return Err(ODataError::method_not_allowed(request.method.as_str(), "$batch"));
        }
        let content_type = request.headers.get(CONTENT_TYPE).unwrap_or_default();
        let boundary = extract_boundary(content_type)?;
        if request.body.len() > self.config.max_batch_bytes {
            return Err(BatchError::TooLarge {
                size: request.body.len(),
                max: self.config.max_batch_bytes,
            }
            .into());
        }

        let frames = BatchParser::new(&boundary)
            .with_max_parts(self.config.max_batch_parts)
            .parse_requests(&request.body)?;
        info!(
            "Batch parsed with {} frame(s) (batch: '{}')",
            frames.len(),
            self.batch_id
        );

        // every frame is checked before any is executed
        let planned = frames
            .into_iter()
            .map(|frame| self.plan(frame))
            .collect::<ODataResult<Vec<_>>>()?;

        let mut locations: HashMap<String, String> = HashMap::new();
        let mut responses = Vec::with_capacity(planned.len());
        for (index, step) in planned.into_iter().enumerate() {
            let (frame, response) = match step {
                Planned::Dispatch { frame, uri } => {
                    let response = match resolve_content_id(&uri, &locations) {
                        Ok(uri) => {
                            debug!(
                                "Batch frame {} dispatching {} {} (batch: '{}')",
                                index, frame.method, uri, self.batch_id
                            );
                            self.executor.execute(frame.to_request(uri)).await
                        }
                        Err(e) => error_response(self.codec, self.config, &e),
                    };
                    (frame, response)
                }
                Planned::Fail { frame, error } => {
                    debug!(
                        "Batch frame {} failed scope check: {} (batch: '{}')",
                        index, error, self.batch_id
                    );
                    let response = error_response(self.codec, self.config, &error);
                    (frame, response)
                }
            };

            if let (Some(id), Some(location)) = (&frame.content_id, response.headers.get(LOCATION)) {
                locations.insert(id.clone(), location.to_string());
            }
            responses.push(BatchResponseFrame::from_response(response, frame.content_id));
        }

        info!(
            "Batch completed with {} response frame(s) (batch: '{}')",
            responses.len(),
            self.batch_id
        );
        let body = write_batch_response(&boundary, &responses);
        Ok(ODataResponse::new(StatusCode::ACCEPTED)
            .with_header(ODATA_VERSION, &self.config.odata_version)
            .with_body(&format!("{};boundary={}", MULTIPART_MIXED, boundary), body))
    }

    fn plan(&self, frame: BatchFrame) -> ODataResult<Planned> {
        match validate_uri(&self.config.base_uri, &frame.uri) {
            Ok(uri) => Ok(Planned::Dispatch { frame, uri }),
            Err(error @ BatchError::InvalidUriScope { .. })
                if self.config.scope_violation == ScopeViolationPolicy::FailFrame =>
            {
                Ok(Planned::Fail {
                    frame,
                    error: error.into(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }
}

/// Replace a leading `$<content-id>` with the `Location` of that earlier frame.
fn resolve_content_id(uri: &str, locations: &HashMap<String, String>) -> ODataResult<String> {
    let Some(reference) = uri.strip_prefix('$') else {
        return Ok(uri.to_string());
    };
    let (id, rest) = match reference.find(['/', '?']) {
        Some(end) => reference.split_at(end),
        None => (reference, ""),
    };
    // system resources such as $metadata are not references
    let system = id.starts_with(|c: char| c.is_ascii_alphabetic()) && !locations.contains_key(id);
    if id.is_empty() || system {
        return Ok(uri.to_string());
    }
    locations
        .get(id)
        .map(|location| format!("{}{}", location, rest))
        .ok_or_else(|| ODataError::bad_request(format!("unknown Content-ID reference ${}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_references() {
        let mut locations = HashMap::new();
        locations.insert("1".to_string(), "http://h/svc/Customers(1)".to_string());

        assert_eq!(
            resolve_content_id("$1/Orders", &locations).unwrap(),
            "http://h/svc/Customers(1)/Orders"
        );
        assert_eq!(resolve_content_id("$metadata", &locations).unwrap(), "$metadata");
        assert_eq!(resolve_content_id("Customers", &locations).unwrap(), "Customers");
        assert!(matches!(
            resolve_content_id("$2", &locations),
            Err(ODataError::BadRequest { .. })
        ));
    }
}
