//! The assembled OData service.
//!
//! # Key Types
//!
//! - [`ODataService`] - Entry point: handles single requests and `$batch`
//! - [`ODataServiceBuilder`] - Assembles model, storage, operations, and config
//! - [`RequestAuthorizer`] - Optional authorization hook

pub mod authorizer;
pub mod builder;
pub mod core;


pub use authorizer::{AllowAll, RequestAuthorizer};
pub use builder::{BuildError, ODataServiceBuilder};
pub use self::core::ODataService;
