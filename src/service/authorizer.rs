//! Authorization hook consulted after a request is parsed.

use crate::handler::Target;
use crate::http::ODataRequest;

/// Decides whether a parsed request may be dispatched.
///
/// Authentication itself happens in the host server; the authorizer sees the
/// request (including any identity headers the host attached) and the resolved
/// target.
pub trait RequestAuthorizer: Send + Sync {
    /// `Err(message)` rejects the request with 403.
    fn authorize(&self, request: &ODataRequest, target: &Target) -> Result<(), String>;
}

/// Authorizer that admits every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl RequestAuthorizer for AllowAll {
    fn authorize(&self, _request: &ODataRequest, _target: &Target) -> Result<(), String> {
        Ok(())
    }
}

impl<F> RequestAuthorizer for F
where
    F: Fn(&ODataRequest, &Target) -> Result<(), String> + Send + Sync,
{
    fn authorize(&self, request: &ODataRequest, target: &Target) -> Result<(), String> {
        self(request, target)
    }
}
