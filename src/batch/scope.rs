//! Scope rules for sub-request URIs.

use super::errors::{BatchError, BatchResult};
use url::{ParseError, Url};

/// Check a sub-request URI against the service root and return the URI to
/// dispatch.
///
/// - `/path` (absolute path without scheme and host) is rejected.
/// - An absolute URI must name the service host and port, and after dot
///   segments are resolved its path must lie at or below the root path.
/// - Anything else is relative to the root and accepted unchanged.
pub fn validate_uri(base: &Url, uri: &str) -> BatchResult<String> {
    if uri.starts_with('/') {
        return Err(BatchError::InvalidRelativeUri {
            uri: uri.to_string(),
        });
    }

    let absolute = match Url::parse(uri) {
        Ok(absolute) => absolute,
        Err(ParseError::RelativeUrlWithoutBase) => return Ok(uri.to_string()),
        Err(_) => return Err(out_of_scope(base, uri)),
    };

    let host = absolute.host_str().unwrap_or_default();
    let port = absolute.port_or_known_default();
    // the foreign part is named: the host, or host and port when only the port differs
    let foreign = if Some(host) != base.host_str() {
        Some(host.to_string())
    } else if port != base.port_or_known_default() {
        Some(match port {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    } else {
        None
    };
    if let Some(host) = foreign {
        return Err(BatchError::InvalidHost {
            uri: uri.to_string(),
            host,
        });
    }

    let root_path = base.path();
    let path = absolute.path();
    let within_root = path.starts_with(root_path) || path == root_path.trim_end_matches('/');
    if absolute.scheme() != base.scheme() || !within_root {
        return Err(out_of_scope(base, uri));
    }
    Ok(absolute.to_string())
}

fn out_of_scope(base: &Url, uri: &str) -> BatchError {
    BatchError::InvalidUriScope {
        uri: uri.to_string(),
        service_root: base.to_string(),
    }
}
