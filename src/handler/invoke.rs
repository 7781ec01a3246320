//! Action and function invocation over HTTP.

use super::core::RequestHandler;
use super::crud::{self, into_object};
use super::resolve::{Arguments, OperationTarget};
use crate::codec::Payload;
use crate::edm::{EdmModel, Operation, OperationBinding, OperationKind, PropertyType, ReturnType};
use crate::error::{ODataError, ODataResult};
use crate::http::{ODataRequest, ODataResponse};
use crate::operation::{BoundInstance, OperationInvoker, OperationValue};
use crate::storage::{StorageKey, StorageProvider};
use crate::uri::ResourcePath;
use http::StatusCode;
use log::info;
use serde_json::{Map, Value};

pub(super) async fn handle<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    request: &ODataRequest,
    path: &ResourcePath,
    name: &str,
    target: OperationTarget,
    arguments: Option<Arguments>,
) -> ODataResult<ODataResponse> {
    let model = handler.model();
    let binding = model_binding(handler, &target)?;

    let kind = model
        .operations_named(name)
        .iter()
        .find(|op| op.binding == binding)
        .map(|op| op.kind)
        .ok_or_else(|| ODataError::not_found(format!("operation {}", name)))?;
    if request.method != kind.http_method() {
        return Err(crud::not_allowed(request, name));
    }

    let (operation, parameters) = match kind {
        OperationKind::Function => {
            let raw = function_arguments(path, arguments.unwrap_or_default())?;
            let names: Vec<&str> = raw.iter().map(|(n, _)| n.as_str()).collect();
            let operation = model.resolve_overload_with(name, &binding, &names, |candidate| {
                parse_arguments(candidate, raw.clone())
                    .is_ok_and(|parsed| arguments_fit(model, candidate, &parsed))
            })?;
            let parameters = parse_arguments(operation, raw)?;
            (operation, parameters)
        }
        OperationKind::Action => {
            if arguments.is_some_and(|args| !args.is_empty()) {
                return Err(ODataError::bad_request(format!(
                    "action '{}' takes its parameters in the request body",
                    name
                )));
            }
            let body = crud::decode_body(handler, request)?;
            let names: Vec<&str> = body.keys().map(String::as_str).collect();
            let operation = model.resolve_overload_with(name, &binding, &names, |candidate| {
                arguments_fit(model, candidate, &body)
            })?;
            (operation, body)
        }
    };

    let instance = bound_instance(handler, target).await?;
    let result = OperationInvoker::new(model, &handler.service.operations).invoke(
        operation,
        instance.as_ref(),
        parameters,
        &handler.request_id,
    )
    .await?;
    info!(
        "Operation '{}' completed with {} (request: '{}')",
        operation.name, result.status, handler.request_id
    );

    respond(handler, operation, result.status, result.value).await
}

fn model_binding<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    target: &OperationTarget,
) -> ODataResult<OperationBinding> {
    let type_of = |entity_set: &str| -> ODataResult<String> {
        let (_, entity_type) = handler.entity_set(entity_set)?;
        Ok(handler.model().unqualified(&entity_type.name).to_string())
    };
    Ok(match target {
        OperationTarget::Unbound => OperationBinding::Unbound,
        OperationTarget::Entity { entity_set, .. } => OperationBinding::Entity(type_of(entity_set)?),
        OperationTarget::Collection { entity_set } => {
            OperationBinding::EntityCollection(type_of(entity_set)?)
        }
    })
}

/// Named inline arguments with parameter aliases (`@p`) resolved from the query.
fn function_arguments(path: &ResourcePath, arguments: Arguments) -> ODataResult<Vec<(String, String)>> {
    arguments
        .into_iter()
        .map(|(name, literal)| {
            let name = name.ok_or_else(|| {
                ODataError::bad_request(format!(
                    "function arguments must be named, got '{}'",
                    literal
                ))
            })?;
            let literal = match literal.strip_prefix('@') {
                Some(_) => path
                    .query_option(&literal)
                    .ok_or_else(|| {
                        ODataError::bad_request(format!("parameter alias {} has no value", literal))
                    })?
                    .to_string(),
                None => literal,
            };
            Ok((name, literal))
        })
        .collect()
}

fn parse_arguments(operation: &Operation, raw: Vec<(String, String)>) -> ODataResult<Map<String, Value>> {
    let mut parameters = Map::with_capacity(raw.len());
    for (name, literal) in raw {
        let value = match operation.parameter(&name).map(|p| &p.parameter_type) {
            _ if literal.starts_with('{') || literal.starts_with('[') => serde_json::from_str(&literal)
                .map_err(|e| ODataError::invalid_parameter(&operation.name, &name, e.to_string()))?,
            Some(PropertyType::Primitive(kind)) => kind
                .parse_literal(&literal)
                .map_err(|reason| ODataError::invalid_parameter(&operation.name, &name, reason))?,
            Some(PropertyType::Complex(_)) if literal == "null" => Value::Null,
            // Left for the invoker to reject with a precise reason
            _ => Value::String(literal),
        };
        parameters.insert(name, value);
    }
    Ok(parameters)
}

/// Whether every supplied argument conforms to the candidate's parameter type.
fn arguments_fit(model: &EdmModel, operation: &Operation, arguments: &Map<String, Value>) -> bool {
    arguments.iter().all(|(name, value)| {
        operation.parameter(name).is_some_and(|p| {
            model
                .validate_value(&p.name, &p.parameter_type, p.nullable, value)
                .is_ok()
        })
    })
}

async fn bound_instance<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    target: OperationTarget,
) -> ODataResult<Option<BoundInstance>> {
    match target {
        OperationTarget::Unbound => Ok(None),
        OperationTarget::Entity { entity_set, key } => {
            let (set, entity_type) = handler.entity_set(&entity_set)?;
            let data = handler.load(set, entity_type, &key).await?;
            Ok(Some(BoundInstance::Entity {
                entity_set,
                key,
                data,
            }))
        }
        OperationTarget::Collection { entity_set } => {
            let (_, entity_type) = handler.entity_set(&entity_set)?;
            let prefix = StorageKey::prefix(handler.model().unqualified(&entity_type.name));
            let entities = handler
                .storage()
                .list(prefix, 0, usize::MAX)
                .await
                .map_err(Into::<ODataError>::into)?
                .into_iter()
                .map(|(_, value)| into_object(value))
                .collect();
            Ok(Some(BoundInstance::Collection {
                entity_set,
                entities,
            }))
        }
    }
}

fn qualified(model: &EdmModel, name: &str) -> String {
    format!("{}.{}", model.namespace(), model.unqualified(name))
}

async fn respond<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    operation: &Operation,
    status: StatusCode,
    value: OperationValue,
) -> ODataResult<ODataResponse> {
    let model = handler.model();
    let return_type = operation.return_type.as_ref();

    let payload = match (value, return_type) {
        (OperationValue::None, _) | (_, None) => return Ok(handler.respond(StatusCode::NO_CONTENT)),
        (OperationValue::Primitive(value), Some(ReturnType::Primitive(kind))) => Payload::Property {
            context: kind.qualified_name().to_string(),
            value,
        },
        (OperationValue::PrimitiveCollection(items), Some(ReturnType::PrimitiveCollection(kind))) => {
            Payload::Collection {
                context: format!("Collection({})", kind.qualified_name()),
                items,
            }
        }
        (OperationValue::Complex(value), Some(ReturnType::Complex(name))) => Payload::Complex {
            context: qualified(model, name),
            value,
        },
        (OperationValue::ComplexCollection(items), Some(ReturnType::ComplexCollection(name))) => {
            Payload::Collection {
                context: format!("Collection({})", qualified(model, name)),
                items: items.into_iter().map(Value::Object).collect(),
            }
        }
        (OperationValue::Entity(entity), Some(ReturnType::Entity(name))) => {
            return respond_entity(handler, operation, status, name, entity).await;
        }
        (OperationValue::EntityCollection(entities), Some(ReturnType::EntityCollection(name))) => {
            Payload::EntityCollection {
                context: operation
                    .entity_set
                    .clone()
                    .unwrap_or_else(|| format!("Collection({})", qualified(model, name))),
                entities,
            }
        }
        (value, Some(return_type)) => {
            return Err(ODataError::ResultTypeMismatch {
                operation: operation.name.clone(),
                expected: return_type.to_string(),
                actual: value.shape().to_string(),
            });
        }
    };
    handler.respond_with(status, &payload)
}

/// Entity results in an entity set are addressable; created ones are stored.
async fn respond_entity<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    operation: &Operation,
    status: StatusCode,
    type_name: &str,
    entity: Map<String, Value>,
) -> ODataResult<ODataResponse> {
    let model = handler.model();
    let Some(entity_set) = operation.entity_set.as_deref() else {
        return handler.respond_with(
            status,
            &Payload::Entity {
                context: qualified(model, type_name),
                entity,
            },
        );
    };

    let (_, entity_type) = handler.entity_set(entity_set)?;
    let key = model.extract_key(entity_type, &entity)?;
    let entity = if status == StatusCode::CREATED {
        let stored = handler
            .storage()
            .create(handler.storage_key(entity_type, key.clone()), Value::Object(entity))
            .await
            .map_err(Into::<ODataError>::into)?;
        into_object(stored)
    } else {
        entity
    };
    handler.respond_with_entity(status, entity_set, &key, entity)
}
