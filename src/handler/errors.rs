//! Mapping of engine errors to HTTP responses.

use crate::codec::FormatCodec;
use crate::config::ServiceConfig;
use crate::error::ODataError;
use crate::http::{ODATA_VERSION, ODataResponse};

/// Structured error response for `error`.
///
/// Status comes from [`ODataError::status_code`]; the body is the codec's
/// error document.
pub fn error_response(
    codec: &dyn FormatCodec,
    config: &ServiceConfig,
    error: &ODataError,
) -> ODataResponse {
    ODataResponse::new(error.status_code())
        .with_header(ODATA_VERSION, &config.odata_version)
        .with_body(codec.content_type(), codec.encode_error(error))
}
