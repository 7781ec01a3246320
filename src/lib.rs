//! OData v4 protocol engine for Rust.
//!
//! Serves entity sets, entities, properties, navigation, and operations over a
//! declarative Entity Data Model, with multipart `$batch` processing on top of
//! the single-request path. The engine is transport-agnostic: the host server
//! turns its HTTP requests into [`ODataRequest`]s and writes back the returned
//! [`ODataResponse`]s.
//!
//! # Core Components
//!
//! - [`EdmModel`] - Entity types, entity sets, and operation signatures
//! - [`ODataService`] - Routes single requests and `$batch`
//! - [`StorageProvider`] - Trait for pluggable entity storage
//! - [`BatchProcessor`] - Multipart batch parsing, scope checks, and execution
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use odata_server::edm::{EdmModel, EntitySet, EntityType, PrimitiveKind};
//! use odata_server::{InMemoryStorage, ODataRequest, ODataServiceBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let model = EdmModel::builder("Demo")
//!     .entity_type(EntityType::new("Item").with_key_property("ID", PrimitiveKind::Int32))
//!     .entity_set(EntitySet::new("Items", "Item"))
//!     .build()?;
//!
//! let service = ODataServiceBuilder::new(InMemoryStorage::new())
//!     .with_model(model)
//!     .with_base_uri("http://localhost:8080/demo.svc/")
//!     .build()?;
//!
//! let response = service
//!     .handle(ODataRequest::get("http://localhost:8080/demo.svc/Items"))
//!     .await;
//! println!("{}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod codec;
pub mod config;
pub mod edm;
pub mod error;
pub mod handler;
pub mod http;
pub mod operation;
pub mod service;
pub mod storage;
pub mod uri;

// Re-export commonly used types for convenience
pub use batch::{BatchError, BatchFrame, BatchParser, BatchProcessor, RequestExecutor};
pub use codec::{FormatCodec, JsonCodec, Payload};
pub use config::{ScopeViolationPolicy, ServiceConfig};
pub use edm::{EdmModel, EdmModelBuilder};
pub use error::{ODataError, ODataResult};
pub use crate::http::{Headers, ODataRequest, ODataResponse};
pub use operation::{OperationImplementation, OperationOutcome, OperationRegistry};
pub use service::{ODataService, ODataServiceBuilder, RequestAuthorizer};
pub use storage::{InMemoryStorage, StorageKey, StorageProvider};
