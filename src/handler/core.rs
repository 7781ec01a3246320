//! Request handler state machine and shared helpers.

use super::errors::error_response;
use super::resolve::{self, Target};
use super::{crud, invoke, navigation};
use crate::codec::Payload;
use crate::edm::{EdmModel, EntityKey, EntitySet, EntityType};
use crate::error::{ODataError, ODataResult};
use crate::http::{ETAG, IF_MATCH, LOCATION, ODATA_VERSION, ODataRequest, ODataResponse};
use crate::service::ODataService;
use crate::storage::{StorageKey, StorageProvider};
use crate::uri;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use http::StatusCode;
use log::{debug, trace, warn};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Header carrying a caller-supplied request id.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Phases a request moves through.
///
/// `ResponseReady` and `Rejected` are terminal. A request is `Rejected` when it
/// fails before dispatch; failures after dispatch still end in `ResponseReady`
/// with an error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Parsed,
    Authorized,
    Dispatched,
    ResponseReady,
    Rejected,
}

/// Handles exactly one request against a service. Not reused across requests.
pub struct RequestHandler<'a, S: StorageProvider> {
    pub(super) service: &'a ODataService<S>,
    pub(super) request_id: String,
    phase: RequestPhase,
}

impl<'a, S: StorageProvider> RequestHandler<'a, S> {
    pub fn new(service: &'a ODataService<S>) -> Self {
        Self {
            service,
            request_id: uuid::Uuid::new_v4().to_string(),
            phase: RequestPhase::Received,
        }
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    /// Process the request and produce its one response.
    pub async fn handle(mut self, request: ODataRequest) -> ODataResponse {
        if let Some(id) = request.headers.get(REQUEST_ID_HEADER) {
            self.request_id = id.to_string();
        }
        debug!(
            "OData request handler processing {} {} (request: '{}')",
            request.method, request.uri, self.request_id
        );

        let response = match self.process(&request).await {
            Ok(response) => {
                self.transition(RequestPhase::ResponseReady);
                response
            }
            Err(e) => {
                let terminal = if self.phase == RequestPhase::Dispatched {
                    RequestPhase::ResponseReady
                } else {
                    RequestPhase::Rejected
                };
                self.transition(terminal);
                warn!(
                    "OData request handler failed: {} (request: '{}')",
                    e, self.request_id
                );
                error_response(self.service.codec(), self.service.config(), &e)
            }
        };

        debug!(
            "OData request handler completed with {} (request: '{}')",
            response.status, self.request_id
        );
        response
    }

    async fn process(&mut self, request: &ODataRequest) -> ODataResult<ODataResponse> {
        let relative = uri::relative_to_root(&self.service.config().base_uri, &request.uri)?;
        let path = uri::parse_resource_path(relative)?;
        let target = resolve::resolve(self.model(), &path)?;
        self.transition(RequestPhase::Parsed);

        self.service
            .authorizer
            .authorize(request, &target)
            .map_err(|message| ODataError::Forbidden { message })?;
        self.transition(RequestPhase::Authorized);

        self.transition(RequestPhase::Dispatched);
        match target {
            Target::ServiceDocument => crud::service_document(self, request),
            Target::Metadata => crud::metadata(self, request),
            Target::Batch => Err(ODataError::bad_request(
                "$batch requests cannot be nested or dispatched as single requests",
            )),
            Target::EntitySet { entity_set } => {
                crud::entity_set(self, request, &path, &entity_set).await
            }
            Target::Count { entity_set } => crud::count(self, request, &entity_set).await,
            Target::Entity { entity_set, key } => {
                crud::entity(self, request, &entity_set, key).await
            }
            Target::Property {
                entity_set,
                key,
                property,
                raw,
            } => crud::property(self, request, &entity_set, key, &property, raw).await,
            Target::Navigation {
                entity_set,
                key,
                navigation,
                reference,
            } => {
                navigation::handle(self, request, &entity_set, key, &navigation, reference).await
            }
            Target::Operation {
                name,
                binding,
                arguments,
            } => invoke::handle(self, request, &path, &name, binding, arguments).await,
        }
    }

    fn transition(&mut self, next: RequestPhase) {
        trace!(
            "Request phase {:?} -> {:?} (request: '{}')",
            self.phase, next, self.request_id
        );
        self.phase = next;
    }

    pub(super) fn model(&self) -> &'a EdmModel {
        &self.service.model
    }

    pub(super) fn storage(&self) -> &'a S {
        &self.service.storage
    }

    /// Entity set and its entity type.
    pub(super) fn entity_set(&self, name: &str) -> ODataResult<(&'a EntitySet, &'a EntityType)> {
        let model = self.model();
        let entity_set = model.entity_set(name)?;
        let entity_type = model.resolve_entity_type(&entity_set.entity_type)?;
        Ok((entity_set, entity_type))
    }

    pub(super) fn storage_key(&self, entity_type: &EntityType, key: EntityKey) -> StorageKey {
        StorageKey::new(self.model().unqualified(&entity_type.name), key)
    }

    /// Load an entity or fail with 404.
    pub(super) async fn load(
        &self,
        entity_set: &EntitySet,
        entity_type: &EntityType,
        key: &EntityKey,
    ) -> ODataResult<Map<String, Value>> {
        let stored = self
            .storage()
            .get(self.storage_key(entity_type, key.clone()))
            .await
            .map_err(Into::<ODataError>::into)?;
        match stored {
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(ODataError::internal(format!(
                "stored entity {}{} is not an object",
                entity_set.name, key
            ))),
            None => Err(ODataError::not_found(format!("{}{}", entity_set.name, key))),
        }
    }

    /// Absolute URI of an entity.
    pub(super) fn entity_url(&self, entity_set: &str, key: &EntityKey) -> String {
        format!(
            "{}{}{}",
            self.service.config().service_root(),
            entity_set,
            key.to_predicate()
        )
    }

    /// Empty response with the standard headers.
    pub(super) fn respond(&self, status: StatusCode) -> ODataResponse {
        ODataResponse::new(status).with_header(ODATA_VERSION, &self.service.config().odata_version)
    }

    /// Response carrying an encoded payload.
    pub(super) fn respond_with(&self, status: StatusCode, payload: &Payload) -> ODataResult<ODataResponse> {
        let codec = self.service.codec();
        let body = codec.encode(self.service.config().service_root(), payload)?;
        Ok(self.respond(status).with_body(codec.content_type(), body))
    }

    /// Entity response with `ETag` and, for created entities, `Location`.
    pub(super) fn respond_with_entity(
        &self,
        status: StatusCode,
        entity_set: &str,
        key: &EntityKey,
        entity: Map<String, Value>,
    ) -> ODataResult<ODataResponse> {
        let tag = etag(&entity);
        let payload = Payload::Entity {
            context: format!("{}/$entity", entity_set),
            entity,
        };
        let mut response = self.respond_with(status, &payload)?.with_header(ETAG, tag);
        if status == StatusCode::CREATED {
            response = response.with_header(LOCATION, self.entity_url(entity_set, key));
        }
        Ok(response)
    }
}

/// Weak entity tag over the canonical JSON of an entity.
pub fn etag(entity: &Map<String, Value>) -> String {
    let canonical = serde_json::to_vec(entity).unwrap_or_default();
    let hash = Sha256::digest(&canonical);
    format!("W/\"{}\"", BASE64.encode(&hash[..8]))
}

/// Enforce an `If-Match` header against the current entity.
pub(super) fn check_if_match(
    request: &ODataRequest,
    resource: &str,
    current: &Map<String, Value>,
) -> ODataResult<()> {
    let Some(expected) = request.headers.get(IF_MATCH) else {
        return Ok(());
    };
    let actual = etag(current);
    let matched = expected
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate == actual);
    if matched {
        Ok(())
    } else {
        Err(ODataError::PreconditionFailed {
            resource: resource.to_string(),
        })
    }
}

/// Drop instance annotations (`@odata.*`, `Prop@...`) from a payload.
pub(super) fn strip_annotations(mut object: Map<String, Value>) -> Map<String, Value> {
    object.retain(|name, _| !name.contains('@'));
    object
}
