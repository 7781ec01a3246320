//! Single-request handling.
//!
//! A [`RequestHandler`] takes one [`ODataRequest`](crate::http::ODataRequest)
//! through a fixed sequence of phases and always produces exactly one
//! response:
//!
//! 1. **Received**: the raw request is accepted and assigned a request id
//! 2. **Parsed**: the target is resolved against the EDM model
//! 3. **Authorized**: the configured authorizer accepted the request
//! 4. **Dispatched**: CRUD, navigation, or operation logic ran
//! 5. **ResponseReady** or **Rejected**: a success or error response exists
//!
//! Every failure becomes a structured error body rendered by the service codec.
//! The handler itself holds no state between requests; concurrent requests share
//! only the read-only model and the storage provider.

pub mod core;
mod crud;
pub mod errors;
mod invoke;
mod navigation;
pub mod resolve;

pub use self::core::{REQUEST_ID_HEADER, RequestHandler, RequestPhase, etag};
pub use errors::error_response;
pub use resolve::{OperationTarget, Target, resolve};
