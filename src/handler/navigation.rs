//! Navigation properties and entity references (`$ref`).
//!
//! Related entities are found through referential constraints, either declared
//! on the navigation property itself (the source holds the foreign key) or on
//! its partner (the target holds it).

use super::core::{RequestHandler, strip_annotations};
use super::crud::{self, into_object, not_allowed};
use super::resolve::{self, Target};
use crate::codec::Payload;
use crate::edm::{EntityKey, EntitySet, EntityType, NavigationProperty, ReferentialConstraint};
use crate::error::{ODataError, ODataResult};
use crate::http::{ODataRequest, ODataResponse};
use crate::storage::{StorageKey, StorageProvider};
use crate::uri;
use http::{Method, StatusCode};
use log::debug;
use serde_json::{Map, Value, json};

const ODATA_ID: &str = "@odata.id";

/// Which side of the relationship stores the constrained properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Holder {
    Source,
    Target,
}

struct Link<'m> {
    holder: Holder,
    constraints: &'m [ReferentialConstraint],
}

impl Link<'_> {
    /// `(target property, value)` pairs identifying related entities, or `None`
    /// when the source has a null foreign key.
    fn match_pairs(&self, source: &Map<String, Value>) -> Option<Vec<(String, Value)>> {
        self.constraints
            .iter()
            .map(|c| {
                let (target_property, source_property) = match self.holder {
                    Holder::Source => (&c.referenced_property, &c.property),
                    Holder::Target => (&c.property, &c.referenced_property),
                };
                match source.get(source_property) {
                    None | Some(Value::Null) => None,
                    Some(value) => Some((target_property.clone(), value.clone())),
                }
            })
            .collect()
    }

    /// Copy key values into the holder so that source and target are related.
    fn bind(&self, source: &mut Map<String, Value>, target: &mut Map<String, Value>) {
        for c in self.constraints {
            match self.holder {
                Holder::Source => {
                    let value = target.get(&c.referenced_property).cloned().unwrap_or(Value::Null);
                    source.insert(c.property.clone(), value);
                }
                Holder::Target => {
                    let value = source.get(&c.referenced_property).cloned().unwrap_or(Value::Null);
                    target.insert(c.property.clone(), value);
                }
            }
        }
    }

    /// Null the holder's constrained properties.
    fn unbind(&self, holder_type: &EntityType, holder: &mut Map<String, Value>) -> ODataResult<()> {
        for c in self.constraints {
            let nullable = holder_type
                .property(&c.property)
                .map(|p| p.nullable)
                .unwrap_or(false);
            if !nullable {
                return Err(ODataError::bad_request(format!(
                    "relationship cannot be removed: '{}' is not nullable",
                    c.property
                )));
            }
            holder.insert(c.property.clone(), Value::Null);
        }
        Ok(())
    }
}

/// Everything needed to follow one navigation property.
struct Navigation<'m> {
    property: &'m NavigationProperty,
    source_set: &'m EntitySet,
    source_type: &'m EntityType,
    target_set: &'m EntitySet,
    target_type: &'m EntityType,
    link: Link<'m>,
}

impl Navigation<'_> {
    fn holder_type(&self) -> &EntityType {
        match self.link.holder {
            Holder::Source => self.source_type,
            Holder::Target => self.target_type,
        }
    }
}

pub(super) async fn handle<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    request: &ODataRequest,
    entity_set: &str,
    key: EntityKey,
    navigation: &str,
    reference: bool,
) -> ODataResult<ODataResponse> {
    let nav = describe(handler, entity_set, navigation)?;
    let mut source = handler.load(nav.source_set, nav.source_type, &key).await?;
    let many = nav.property.multiplicity.is_collection();
    let target = format!("{}{}/{}", nav.source_set.name, key, navigation);
    // PUT sets a single-valued reference, POST adds to a collection
    let adds_reference = request.method == if many { Method::POST } else { Method::PUT };

    debug!(
        "Navigating {} to {} (request: '{}')",
        target, nav.target_set.name, handler.request_id
    );

    match (reference, request.method.clone()) {
        (false, Method::GET) => {
            let related = related(handler, &nav, &source).await?;
            if many {
                return handler.respond_with(
                    StatusCode::OK,
                    &Payload::EntityCollection {
                        context: nav.target_set.name.clone(),
                        entities: related,
                    },
                );
            }
            match related.into_iter().next() {
                Some(entity) => {
                    let related_key = handler.model().extract_key(nav.target_type, &entity)?;
                    handler.respond_with_entity(
                        StatusCode::OK,
                        &nav.target_set.name,
                        &related_key,
                        entity,
                    )
                }
                None => Ok(handler.respond(StatusCode::NO_CONTENT)),
            }
        }
        (false, Method::POST) if many && nav.link.holder == Holder::Target => {
            let mut body = crud::decode_body(handler, request)?;
            nav.link.bind(&mut source, &mut body);
            crud::create(handler, nav.target_set, nav.target_type, body).await
        }
        (true, Method::GET) => {
            let related = related(handler, &nav, &source).await?;
            let mut ids = Vec::with_capacity(related.len());
            for entity in &related {
                let related_key = handler.model().extract_key(nav.target_type, entity)?;
                ids.push(json!({ ODATA_ID: handler.entity_url(&nav.target_set.name, &related_key) }));
            }
            if many {
                return handler.respond_with(
                    StatusCode::OK,
                    &Payload::Collection {
                        context: "Collection($ref)".to_string(),
                        items: ids,
                    },
                );
            }
            match ids.into_iter().next() {
                Some(Value::Object(value)) => handler.respond_with(
                    StatusCode::OK,
                    &Payload::Complex {
                        context: "$ref".to_string(),
                        value,
                    },
                ),
                _ => Ok(handler.respond(StatusCode::NO_CONTENT)),
            }
        }
        (true, _) if adds_reference => {
            let (target_key, mut related) = referenced_entity(handler, &nav, request).await?;
            nav.link.bind(&mut source, &mut related);
            store_holder(handler, &nav, &key, source, &target_key, related).await?;
            Ok(handler.respond(StatusCode::NO_CONTENT))
        }
        (true, Method::DELETE) => {
            let current = if many {
                let id = reference_id(request)?;
                let (target_key, related) = entity_by_id(handler, &nav, &id).await?;
                let pairs = nav.link.match_pairs(&source).unwrap_or_default();
                let is_related = !pairs.is_empty()
                    && pairs.iter().all(|(name, value)| related.get(name) == Some(value));
                if !is_related {
                    return Err(ODataError::not_found(format!("{}/$ref?$id={}", target, id)));
                }
                Some((target_key, related))
            } else {
                match related(handler, &nav, &source).await?.into_iter().next() {
                    Some(entity) => {
                        Some((handler.model().extract_key(nav.target_type, &entity)?, entity))
                    }
                    None => None,
                }
            };
            let Some((target_key, mut related)) = current else {
                return Ok(handler.respond(StatusCode::NO_CONTENT));
            };
            let holder_type = nav.holder_type();
            match nav.link.holder {
                Holder::Source => nav.link.unbind(holder_type, &mut source)?,
                Holder::Target => nav.link.unbind(holder_type, &mut related)?,
            }
            store_holder(handler, &nav, &key, source, &target_key, related).await?;
            Ok(handler.respond(StatusCode::NO_CONTENT))
        }
        _ => Err(not_allowed(
            request,
            &if reference { format!("{}/$ref", target) } else { target },
        )),
    }
}

fn describe<'m, S: StorageProvider>(
    handler: &RequestHandler<'m, S>,
    entity_set: &str,
    navigation: &str,
) -> ODataResult<Navigation<'m>> {
    let model = handler.model();
    let (source_set, source_type) = handler.entity_set(entity_set)?;
    let property = source_type
        .navigation(navigation)
        .ok_or_else(|| ODataError::not_found(format!("{}/{}", entity_set, navigation)))?;
    let target_set = model.binding_target(source_set, navigation).ok_or_else(|| {
        ODataError::bad_request(format!(
            "navigation property '{}' of '{}' has no bound entity set",
            navigation, entity_set
        ))
    })?;
    let target_type = model.resolve_entity_type(&target_set.entity_type)?;

    let link = if !property.referential_constraints.is_empty() {
        Link {
            holder: Holder::Source,
            constraints: &property.referential_constraints,
        }
    } else {
        let partner = property
            .partner
            .as_deref()
            .and_then(|partner| target_type.navigation(partner))
            .filter(|partner| !partner.referential_constraints.is_empty())
            .ok_or_else(|| {
                ODataError::bad_request(format!(
                    "navigation property '{}' has no referential constraints",
                    navigation
                ))
            })?;
        Link {
            holder: Holder::Target,
            constraints: &partner.referential_constraints,
        }
    };

    Ok(Navigation {
        property,
        source_set,
        source_type,
        target_set,
        target_type,
        link,
    })
}

async fn related<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    nav: &Navigation<'_>,
    source: &Map<String, Value>,
) -> ODataResult<Vec<Map<String, Value>>> {
    let Some(pairs) = nav.link.match_pairs(source) else {
        return Ok(Vec::new());
    };
    let prefix = StorageKey::prefix(handler.model().unqualified(&nav.target_type.name));
    let found = handler
        .storage()
        .find_by_properties(prefix, &pairs)
        .await
        .map_err(Into::<ODataError>::into)?;
    Ok(found.into_iter().map(|(_, value)| into_object(value)).collect())
}

/// Entity named by the `@odata.id` of a reference body.
async fn referenced_entity<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    nav: &Navigation<'_>,
    request: &ODataRequest,
) -> ODataResult<(EntityKey, Map<String, Value>)> {
    let body = handler.service.codec().decode_object(&request.body)?;
    let id = body
        .get(ODATA_ID)
        .and_then(Value::as_str)
        .ok_or_else(|| ODataError::bad_request("reference body must contain '@odata.id'"))?;
    entity_by_id(handler, nav, id).await
}

async fn entity_by_id<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    nav: &Navigation<'_>,
    id: &str,
) -> ODataResult<(EntityKey, Map<String, Value>)> {
    let relative = uri::relative_to_root(&handler.service.config().base_uri, id)?;
    let path = uri::parse_resource_path(relative)?;
    match resolve::resolve(handler.model(), &path)? {
        Target::Entity { entity_set, key } if entity_set == nav.target_set.name => {
            let entity = handler.load(nav.target_set, nav.target_type, &key).await?;
            Ok((key, strip_annotations(entity)))
        }
        _ => Err(ODataError::bad_request(format!(
            "'{}' does not identify an entity of '{}'",
            id, nav.target_set.name
        ))),
    }
}

fn reference_id(request: &ODataRequest) -> ODataResult<String> {
    let relative = request.uri.split_once('?').map(|(_, query)| query).unwrap_or_default();
    let path = uri::parse_resource_path(&format!("?{}", relative))?;
    path.query_option("$id")
        .map(str::to_string)
        .ok_or_else(|| ODataError::bad_request("deleting a collection reference requires $id"))
}

/// Persist whichever side of the relationship changed.
async fn store_holder<S: StorageProvider>(
    handler: &RequestHandler<'_, S>,
    nav: &Navigation<'_>,
    source_key: &EntityKey,
    source: Map<String, Value>,
    target_key: &EntityKey,
    target: Map<String, Value>,
) -> ODataResult<()> {
    let (entity_type, key, entity) = match nav.link.holder {
        Holder::Source => (nav.source_type, source_key, source),
        Holder::Target => (nav.target_type, target_key, target),
    };
    handler
        .storage()
        .update(handler.storage_key(entity_type, key.clone()), Value::Object(entity))
        .await
        .map_err(Into::<ODataError>::into)?;
    Ok(())
}
