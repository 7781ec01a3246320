//! Service document, metadata, and entity CRUD.

use super::core::{RequestHandler, check_if_match, etag, strip_annotations};
use crate::batch::media_type;
use crate::codec::Payload;
use crate::edm::{EntityKey, EntitySet, EntityType, EntityValidation, OperationBinding, OperationKind};
use crate::error::{ODataError, ODataResult};
use crate::http::{CONTENT_TYPE, ETAG, IF_MATCH, ODataRequest, ODataResponse};
use crate::storage::{StorageKey, StorageProvider};
use crate::uri::ResourcePath;
use http::{Method, StatusCode};
use log::{debug, info};
use serde_json::{Map, Value};

const TEXT_PLAIN: &str = "text/plain";

pub(super) fn service_document<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    request: &ODataRequest,
) -> ODataResult<ODataResponse> {
    require(request, &[Method::GET], "service document")?;
    let model = handler.model();
    let entity_sets = model.entity_sets().map(|set| set.name.clone()).collect();
    let mut function_imports: Vec<String> = model
        .operations()
        .filter(|op| op.kind == OperationKind::Function && op.binding == OperationBinding::Unbound)
        .map(|op| op.name.clone())
        .collect();
    function_imports.dedup();
    handler.respond_with(
        StatusCode::OK,
        &Payload::ServiceDocument {
            entity_sets,
            function_imports,
        },
    )
}

pub(super) fn metadata<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    request: &ODataRequest,
) -> ODataResult<ODataResponse> {
    require(request, &[Method::GET], "$metadata")?;
    let model = serde_json::to_value(handler.model())?;
    handler.respond_with(StatusCode::OK, &Payload::Metadata(model))
}

pub(super) async fn entity_set<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    request: &ODataRequest,
    path: &ResourcePath,
    name: &str,
) -> ODataResult<ODataResponse> {
    let (entity_set, entity_type) = handler.entity_set(name)?;
    match request.method {
        Method::GET => {
            let skip = path.numeric_option("$skip")?.unwrap_or(0);
            let top = path.numeric_option("$top")?.unwrap_or(usize::MAX);
            let prefix = StorageKey::prefix(handler.model().unqualified(&entity_type.name));
            let entities = handler
                .storage()
                .list(prefix, skip, top)
                .await
                .map_err(Into::<ODataError>::into)?
                .into_iter()
                .filter_map(|(_, value)| match value {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();
            handler.respond_with(
                StatusCode::OK,
                &Payload::EntityCollection {
                    context: entity_set.name.clone(),
                    entities,
                },
            )
        }
        Method::POST => {
            let body = decode_body(handler, request)?;
            create(handler, entity_set, entity_type, body).await
        }
        _ => Err(not_allowed(request, &entity_set.name)),
    }
}

/// Validate and store a new entity; 201 with `Location` and `ETag`.
pub(super) async fn create<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    entity_set: &EntitySet,
    entity_type: &EntityType,
    body: Map<String, Value>,
) -> ODataResult<ODataResponse> {
    let model = handler.model();
    model.validate_entity(entity_type, &body, EntityValidation::Complete)?;
    let key = model.extract_key(entity_type, &body)?;

    let stored = handler
        .storage()
        .create(handler.storage_key(entity_type, key.clone()), Value::Object(body))
        .await
        .map_err(Into::<ODataError>::into)?;
    info!(
        "Created {}{} (request: '{}')",
        entity_set.name, key, handler.request_id
    );
    handler.respond_with_entity(StatusCode::CREATED, &entity_set.name, &key, into_object(stored))
}

pub(super) async fn count<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    request: &ODataRequest,
    name: &str,
) -> ODataResult<ODataResponse> {
    let (entity_set, entity_type) = handler.entity_set(name)?;
    require(request, &[Method::GET], &format!("{}/$count", entity_set.name))?;
    let count = handler
        .storage()
        .count(StorageKey::prefix(handler.model().unqualified(&entity_type.name)))
        .await
        .map_err(Into::<ODataError>::into)?;
    Ok(handler
        .respond(StatusCode::OK)
        .with_body(TEXT_PLAIN, count.to_string()))
}

pub(super) async fn entity<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    request: &ODataRequest,
    name: &str,
    key: EntityKey,
) -> ODataResult<ODataResponse> {
    let (entity_set, entity_type) = handler.entity_set(name)?;
    let resource = format!("{}{}", entity_set.name, key);

    match request.method {
        Method::GET => {
            let entity = handler.load(entity_set, entity_type, &key).await?;
            handler.respond_with_entity(StatusCode::OK, &entity_set.name, &key, entity)
        }
        Method::PUT => {
            let current = handler.load(entity_set, entity_type, &key).await?;
            check_if_match(request, &resource, &current)?;
            let mut body = decode_body(handler, request)?;
            apply_url_key(&key, &mut body)?;
            handler
                .model()
                .validate_entity(entity_type, &body, EntityValidation::Complete)?;
            let expected = precondition(request, &current);
            replace(handler, entity_type, &key, expected, body).await
        }
        Method::PATCH => {
            let mut current = handler.load(entity_set, entity_type, &key).await?;
            check_if_match(request, &resource, &current)?;
            let expected = precondition(request, &current);
            let body = decode_body(handler, request)?;
            handler
                .model()
                .validate_entity(entity_type, &body, EntityValidation::Partial)?;
            for (name, value) in body {
                let changes_key = entity_type.is_key_property(&name)
                    && key.get(&name).map(|k| k.to_json()).as_ref() != Some(&value);
                if changes_key {
                    return Err(ODataError::bad_request(format!(
                        "key property '{}' cannot be changed",
                        name
                    )));
                }
                current.insert(name, value);
            }
            replace(handler, entity_type, &key, expected, current).await
        }
        Method::DELETE => {
            let storage_key = handler.storage_key(entity_type, key.clone());
            let removed = if request.headers.contains(IF_MATCH) {
                let current = handler.load(entity_set, entity_type, &key).await?;
                check_if_match(request, &resource, &current)?;
                handler
                    .storage()
                    .conditional_delete(storage_key, Value::Object(current))
                    .await
            } else {
                handler.storage().delete(storage_key).await
            }
            .map_err(Into::<ODataError>::into)?;
            if !removed {
                return Err(ODataError::not_found(resource));
            }
            info!("Deleted {} (request: '{}')", resource, handler.request_id);
            Ok(handler.respond(StatusCode::NO_CONTENT))
        }
        _ => Err(not_allowed(request, &resource)),
    }
}

async fn replace<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    entity_type: &EntityType,
    key: &EntityKey,
    expected: Option<Value>,
    entity: Map<String, Value>,
) -> ODataResult<ODataResponse> {
    let storage_key = handler.storage_key(entity_type, key.clone());
    let entity = Value::Object(entity);
    let stored = match expected {
        Some(expected) => {
            handler
                .storage()
                .conditional_update(storage_key, expected, entity)
                .await
        }
        None => handler.storage().update(storage_key, entity).await,
    }
    .map_err(Into::<ODataError>::into)?;
    debug!(
        "Updated {}{} (request: '{}')",
        entity_type.name, key, handler.request_id
    );
    Ok(handler
        .respond(StatusCode::NO_CONTENT)
        .with_header(ETAG, etag(&into_object(stored))))
}

/// Data an If-Match write expects to replace; `None` when the write is unconditional.
fn precondition(request: &ODataRequest, current: &Map<String, Value>) -> Option<Value> {
    request
        .headers
        .contains(IF_MATCH)
        .then(|| Value::Object(current.clone()))
}

/// Key values come from the URL; a conflicting key in the body is an error.
fn apply_url_key(key: &EntityKey, body: &mut Map<String, Value>) -> ODataResult<()> {
    for (name, value) in key.parts() {
        let expected = value.to_json();
        match body.get(name) {
            Some(given) if given != &expected => {
                return Err(ODataError::bad_request(format!(
                    "key property '{}' in the body does not match the URL",
                    name
                )));
            }
            Some(_) => {}
            None => {
                body.insert(name.clone(), expected);
            }
        }
    }
    Ok(())
}

pub(super) async fn property<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    request: &ODataRequest,
    name: &str,
    key: EntityKey,
    property: &str,
    raw: bool,
) -> ODataResult<ODataResponse> {
    let (entity_set, entity_type) = handler.entity_set(name)?;
    let context = format!("{}{}/{}", entity_set.name, key, property);
    require(request, &[Method::GET], &context)?;

    let mut entity = handler.load(entity_set, entity_type, &key).await?;
    let value = entity.remove(property).unwrap_or(Value::Null);

    if value.is_null() {
        return Ok(handler.respond(StatusCode::NO_CONTENT));
    }
    if raw {
        let text = match value {
            Value::String(text) => text,
            other => other.to_string(),
        };
        return Ok(handler.respond(StatusCode::OK).with_body(TEXT_PLAIN, text));
    }

    let payload = match value {
        Value::Object(value) => Payload::Complex { context, value },
        Value::Array(items) => Payload::Collection { context, items },
        value => Payload::Property { context, value },
    };
    handler.respond_with(StatusCode::OK, &payload)
}

/// Decode a request body with the service codec, dropping annotations.
pub(super) fn decode_body<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    request: &ODataRequest,
) -> ODataResult<Map<String, Value>> {
    let codec = handler.service.codec();
    if let Some(content_type) = request.headers.get(CONTENT_TYPE) {
        if media_type(content_type) != media_type(codec.content_type()) {
            return Err(ODataError::UnsupportedMediaType {
                content_type: content_type.to_string(),
            });
        }
    }
    codec.decode_object(&request.body).map(strip_annotations)
}

pub(super) fn require(request: &ODataRequest, allowed: &[Method], target: &str) -> ODataResult<()> {
    if allowed.contains(&request.method) {
        Ok(())
    } else {
        Err(not_allowed(request, target))
    }
}

pub(super) fn not_allowed(request: &ODataRequest, target: &str) -> ODataError {
    ODataError::method_not_allowed(request.method.as_str(), target)
}

pub(super) fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
