//! Builder for [`ODataService`] instances.

use super::authorizer::{AllowAll, RequestAuthorizer};
use super::core::ODataService;
use crate::codec::{FormatCodec, JsonCodec};
use crate::config::{ConfigError, ServiceConfig};
use crate::edm::EdmModel;
use crate::error::ODataResult;
use crate::operation::{
    InvocationContext, OperationFuture, OperationImplementation, OperationOutcome, OperationRegistry,
};
use crate::storage::StorageProvider;
use log::info;
use std::sync::Arc;

/// Errors raised while assembling a service.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No EDM model was supplied")]
    MissingModel,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Implementation registered for undeclared operation '{0}'")]
    UnknownOperation(String),
}

/// Fluent assembly of an [`ODataService`].
///
/// # Examples
///
/// ```rust
/// use odata_server::edm::{EdmModel, Operation, PrimitiveKind, ReturnType};
/// use odata_server::operation::OperationOutcome;
/// use odata_server::service::ODataServiceBuilder;
/// use odata_server::storage::InMemoryStorage;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let model = EdmModel::builder("Demo")
///     .operation(Operation::function("Hello").returns(ReturnType::Primitive(PrimitiveKind::String)))
///     .build()?;
///
/// let service = ODataServiceBuilder::new(InMemoryStorage::new())
///     .with_model(model)
///     .with_base_uri("http://localhost:8080/demo.svc/")
///     .with_operation("Hello", |_| Ok(OperationOutcome::primitive("world")))
///     .build()?;
/// assert_eq!(service.config().service_root(), "http://localhost:8080/demo.svc/");
/// # Ok(())
/// # }
/// ```
pub struct ODataServiceBuilder<S> {
    storage: S,
    model: Option<EdmModel>,
    operations: OperationRegistry,
    codec: Arc<dyn FormatCodec>,
    config: ServiceConfig,
    base_uri: Option<String>,
    authorizer: Arc<dyn RequestAuthorizer>,
}

impl<S: StorageProvider> ODataServiceBuilder<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            model: None,
            operations: OperationRegistry::new(),
            codec: Arc::new(JsonCodec::new()),
            config: ServiceConfig::default(),
            base_uri: None,
            authorizer: Arc::new(AllowAll),
        }
    }

    pub fn with_model(mut self, model: EdmModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Service root; parsed and validated in [`build`](Self::build).
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_codec(mut self, codec: impl FormatCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn with_authorizer(mut self, authorizer: impl RequestAuthorizer + 'static) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    /// Register a closure as the implementation of `name`.
    pub fn with_operation<F>(mut self, name: impl Into<String>, implementation: F) -> Self
    where
        F: Fn(&InvocationContext<'_>) -> ODataResult<OperationOutcome> + Send + Sync + 'static,
    {
        self.operations.register(name, implementation);
        self
    }

    /// Register a closure returning a future as the implementation of `name`.
    pub fn with_async_operation<F>(mut self, name: impl Into<String>, implementation: F) -> Self
    where
        F: for<'a> Fn(InvocationContext<'a>) -> OperationFuture<'a> + Send + Sync + 'static,
    {
        self.operations.register_async(name, implementation);
        self
    }

    pub fn with_operation_implementation(
        mut self,
        name: impl Into<String>,
        implementation: impl OperationImplementation + 'static,
    ) -> Self {
        self.operations.register_implementation(name, implementation);
        self
    }

    pub fn build(self) -> Result<ODataService<S>, BuildError> {
        let model = self.model.ok_or(BuildError::MissingModel)?;

        let mut config = self.config;
        if let Some(base_uri) = self.base_uri {
            config.base_uri = url::Url::parse(&base_uri)
                .map_err(|_| ConfigError::InvalidBaseUri(base_uri.clone()))?;
        }
        let config = config.validated()?;

        if let Some(unknown) = self.operations.names().find(|name| !model.has_operation(name)) {
            return Err(BuildError::UnknownOperation(unknown.to_string()));
        }

        info!(
            "OData service built at {} with {} entity set(s) and {} operation implementation(s)",
            config.service_root(),
            model.entity_sets().count(),
            self.operations.len()
        );

        Ok(ODataService {
            model: Arc::new(model),
            storage: Arc::new(self.storage),
            operations: Arc::new(self.operations),
            codec: self.codec,
            config: Arc::new(config),
            authorizer: self.authorizer,
        })
    }
}
