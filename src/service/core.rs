//! Core service type and request entry points.

use super::authorizer::RequestAuthorizer;
use crate::batch::{BatchProcessor, RequestExecutor};
use crate::codec::FormatCodec;
use crate::config::ServiceConfig;
use crate::edm::EdmModel;
use crate::handler::RequestHandler;
use crate::http::{ODataRequest, ODataResponse};
use crate::operation::OperationRegistry;
use crate::storage::StorageProvider;
use crate::uri;
use log::debug;
use std::sync::Arc;

/// An OData service: model, storage, operations, and wire format.
///
/// Cheap to clone; clones share everything. The model and operation registry
/// are read-only, so requests run concurrently without coordination beyond what
/// the storage provider does internally.
pub struct ODataService<S: StorageProvider> {
    pub(crate) model: Arc<EdmModel>,
    pub(crate) storage: Arc<S>,
    pub(crate) operations: Arc<OperationRegistry>,
    pub(crate) codec: Arc<dyn FormatCodec>,
    pub(crate) config: Arc<ServiceConfig>,
    pub(crate) authorizer: Arc<dyn RequestAuthorizer>,
}

impl<S: StorageProvider> Clone for ODataService<S> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            storage: Arc::clone(&self.storage),
            operations: Arc::clone(&self.operations),
            codec: Arc::clone(&self.codec),
            config: Arc::clone(&self.config),
            authorizer: Arc::clone(&self.authorizer),
        }
    }
}

impl<S: StorageProvider> ODataService<S> {
    pub fn model(&self) -> &EdmModel {
        &self.model
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn codec(&self) -> &dyn FormatCodec {
        self.codec.as_ref()
    }

    /// Handle one top-level request, routing `$batch` to the batch processor.
    pub async fn handle(&self, request: ODataRequest) -> ODataResponse {
        if self.is_batch_request(&request) {
            debug!("Routing {} {} to batch processor", request.method, request.uri);
            return BatchProcessor::new(self, &self.config, self.codec.as_ref())
                .process(&request)
                .await;
        }
        self.execute(request).await
    }

    fn is_batch_request(&self, request: &ODataRequest) -> bool {
        uri::relative_to_root(&self.config.base_uri, &request.uri)
            .map(|relative| relative.split('?').next() == Some("$batch"))
            .unwrap_or(false)
    }
}

impl<S: StorageProvider> RequestExecutor for ODataService<S> {
    /// Single requests only; a `$batch` target inside a batch is rejected by the handler.
    async fn execute(&self, request: ODataRequest) -> ODataResponse {
        RequestHandler::new(self).handle(request).await
    }
}
