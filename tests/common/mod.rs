//! Shared fixtures for the integration suites.
//!
//! [`tecsvc`] assembles a technical test service modelled on the usual OData
//! conformance service: all primitive kinds, a two-part key, composite-keyed
//! messages, a customer/order association, a family of action imports
//! covering every return shape, and operations bound to `ETAllPrim`.

#![allow(dead_code)]

pub mod builders;

use odata_server::edm::{
    ComplexType, EdmModel, EntitySet, EntityType, Multiplicity, NavigationProperty, Operation,
    OperationBinding, Parameter, PrimitiveKind, Property, ReturnType,
};
use odata_server::operation::{BoundInstance, InvocationContext, OperationOutcome, OperationValue};
use odata_server::{
    InMemoryStorage, ODataError, ODataRequest, ODataResponse, ODataService, ODataServiceBuilder,
    StorageKey, StorageProvider,
};
use serde_json::{Map, Value, json};

pub const SERVICE_ROOT: &str = "http://localhost:9080/odata-server-tecsvc/odata.svc/";
pub const NAMESPACE: &str = "olingo.odata.test1";

pub type TestService = ODataService<InMemoryStorage>;

/// Absolute URI of `path` below the service root.
pub fn url(path: &str) -> String {
    format!("{}{}", SERVICE_ROOT, path)
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub fn model() -> EdmModel {
    EdmModel::builder(NAMESPACE)
        .complex_type(ComplexType::new(
            "CTTwoPrim",
            vec![
                Property::primitive("PropertyInt16", PrimitiveKind::Int16),
                Property::primitive("PropertyString", PrimitiveKind::String),
            ],
        ))
        .entity_type(all_prim())
        .entity_type(
            EntityType::new("ETTwoKeyTwoPrim")
                .with_key_property("PropertyInt16", PrimitiveKind::Int16)
                .with_key_property("PropertyString", PrimitiveKind::String),
        )
        .entity_type(
            EntityType::new("ETKeyNav")
                .with_key_property("PropertyInt16", PrimitiveKind::Int16)
                .with_property(Property::primitive("PropertyString", PrimitiveKind::String))
                .with_property(Property::complex("PropertyCompTwoPrim", "CTTwoPrim")),
        )
        .entity_type(
            EntityType::new("Customer")
                .with_key_property("CustomerID", PrimitiveKind::Int32)
                .with_property(Property::primitive("Name", PrimitiveKind::String))
                .with_navigation(
                    NavigationProperty::new("Orders", "Order", Multiplicity::Many)
                        .with_partner("Customer"),
                ),
        )
        .entity_type(
            EntityType::new("Order")
                .with_key_property("OrderID", PrimitiveKind::Int32)
                .with_property(Property::primitive("CustomerID", PrimitiveKind::Int32))
                .with_property(Property::primitive("OrderDate", PrimitiveKind::DateTimeOffset))
                .with_navigation(
                    NavigationProperty::new("Customer", "Customer", Multiplicity::ZeroOrOne)
                        .with_partner("Orders")
                        .with_constraint("CustomerID", "CustomerID"),
                ),
        )
        .entity_type(
            EntityType::new("Message")
                .with_key_property("FromUsername", PrimitiveKind::String)
                .with_key_property("MessageId", PrimitiveKind::Int32)
                .with_property(Property::primitive("Subject", PrimitiveKind::String))
                .with_property(Property::primitive("Body", PrimitiveKind::String)),
        )
        .entity_set(EntitySet::new("ESAllPrim", "ETAllPrim"))
        .entity_set(EntitySet::new("ESTwoKeyTwoPrim", "ETTwoKeyTwoPrim"))
        .entity_set(EntitySet::new("ESKeyNav", "ETKeyNav"))
        .entity_set(EntitySet::new("Customers", "Customer").with_binding("Orders", "Orders"))
        .entity_set(EntitySet::new("Orders", "Order").with_binding("Customer", "Customers"))
        .entity_set(EntitySet::new("Messages", "Message"))
        .operation(Operation::action("AIRTString").returns(ReturnType::Primitive(PrimitiveKind::String)))
        .operation(
            Operation::action("AIRTCollStringTwoParam")
                .with_parameter(Parameter::primitive("ParameterInt16", PrimitiveKind::Int16))
                .with_parameter(Parameter::primitive("ParameterDuration", PrimitiveKind::Duration))
                .returns(ReturnType::PrimitiveCollection(PrimitiveKind::String)),
        )
        .operation(
            Operation::action("AIRTCTTwoPrimParam")
                .with_parameter(Parameter::primitive("ParameterInt16", PrimitiveKind::Int16))
                .with_parameter(Parameter::primitive("ParameterString", PrimitiveKind::String))
                .returns(ReturnType::Complex("CTTwoPrim".into())),
        )
        .operation(
            Operation::action("AIRTCollCTTwoPrimParam")
                .with_parameter(Parameter::primitive("ParameterInt16", PrimitiveKind::Int16))
                .with_parameter(Parameter::primitive("ParameterString", PrimitiveKind::String))
                .returns(ReturnType::ComplexCollection("CTTwoPrim".into())),
        )
        .operation(
            Operation::action("AIRTETTwoKeyTwoPrimParam")
                .with_parameter(Parameter::primitive("ParameterInt16", PrimitiveKind::Int16))
                .returns(ReturnType::Entity("ETTwoKeyTwoPrim".into())),
        )
        .operation(
            Operation::action("AIRTCollETKeyNavParam")
                .with_parameter(Parameter::primitive("ParameterInt16", PrimitiveKind::Int16))
                .with_parameter(Parameter::primitive("ParameterDuration", PrimitiveKind::Duration))
                .returns(ReturnType::EntityCollection("ETKeyNav".into())),
        )
        .operation(
            Operation::action("AIRTESAllPrimParam")
                .with_parameter(Parameter::primitive("ParameterDate", PrimitiveKind::Date))
                .returns(ReturnType::Entity("ETAllPrim".into()))
                .in_entity_set("ESAllPrim"),
        )
        .operation(
            Operation::action("AIRTCollESAllPrimParam")
                .with_parameter(Parameter::primitive("ParameterTimeOfDay", PrimitiveKind::TimeOfDay))
                .returns(ReturnType::EntityCollection("ETAllPrim".into()))
                .in_entity_set("ESAllPrim"),
        )
        .operation(Operation::function("FICRTString").returns(ReturnType::Primitive(PrimitiveKind::String)))
        .operation(
            Operation::function("BFCETAllPrimRTString")
                .bound_to(OperationBinding::Entity(format!("{}.ETAllPrim", NAMESPACE)))
                .returns(ReturnType::Primitive(PrimitiveKind::String)),
        )
        .operation(
            Operation::function("BFCESAllPrimRTInt32")
                .bound_to(OperationBinding::EntityCollection("ETAllPrim".into()))
                .returns(ReturnType::Primitive(PrimitiveKind::Int32)),
        )
        .operation(
            Operation::action("BAETAllPrimRTVoid")
                .bound_to(OperationBinding::Entity("ETAllPrim".into()))
                .with_parameter(Parameter::primitive("ParameterString", PrimitiveKind::String)),
        )
        .build()
        .expect("technical service model is consistent")
}

fn all_prim() -> EntityType {
    [
        ("PropertyString", PrimitiveKind::String),
        ("PropertyBoolean", PrimitiveKind::Boolean),
        ("PropertyByte", PrimitiveKind::Byte),
        ("PropertySByte", PrimitiveKind::SByte),
        ("PropertyInt32", PrimitiveKind::Int32),
        ("PropertyInt64", PrimitiveKind::Int64),
        ("PropertySingle", PrimitiveKind::Single),
        ("PropertyDouble", PrimitiveKind::Double),
        ("PropertyDecimal", PrimitiveKind::Decimal),
        ("PropertyBinary", PrimitiveKind::Binary),
        ("PropertyDate", PrimitiveKind::Date),
        ("PropertyDateTimeOffset", PrimitiveKind::DateTimeOffset),
        ("PropertyDuration", PrimitiveKind::Duration),
        ("PropertyGuid", PrimitiveKind::Guid),
        ("PropertyTimeOfDay", PrimitiveKind::TimeOfDay),
    ]
    .into_iter()
    .fold(
        EntityType::new("ETAllPrim").with_key_property("PropertyInt16", PrimitiveKind::Int16),
        |entity_type, (name, kind)| entity_type.with_property(Property::primitive(name, kind)),
    )
}

/// A full `ETAllPrim` instance with key `id`.
pub fn all_prim_entity(id: i64) -> Value {
    json!({
        "PropertyInt16": id,
        "PropertyString": "First Resource - positive values",
        "PropertyBoolean": true,
        "PropertyByte": 255,
        "PropertySByte": 127,
        "PropertyInt32": 2147483647,
        "PropertyInt64": 9223372036854775807i64,
        "PropertySingle": 1.79e20,
        "PropertyDouble": -1.79e19,
        "PropertyDecimal": 34,
        "PropertyBinary": "ASNFZ4mrze8",
        "PropertyDate": "2012-12-03",
        "PropertyDateTimeOffset": "2012-12-03T07:16:23Z",
        "PropertyDuration": "P6DT5H4M3S",
        "PropertyGuid": "01234567-89ab-cdef-0123-456789abcdef",
        "PropertyTimeOfDay": "03:26:05"
    })
}

/// Route engine logs to the test output; `RUST_LOG=debug` shows per-frame dispatch.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// The technical service with its action implementations and no data.
pub fn tecsvc() -> TestService {
    init_logging();
    let storage = InMemoryStorage::new();
    let writer = storage.clone();
    ODataServiceBuilder::new(storage)
        .with_model(model())
        .with_base_uri(SERVICE_ROOT)
        .with_operation("AIRTString", |_| {
            Ok(OperationOutcome::primitive("UARTString string value"))
        })
        .with_operation("AIRTCollStringTwoParam", |ctx| {
            let count = ctx.int("ParameterInt16").unwrap_or(0).max(0);
            let duration = ctx.str("ParameterDuration").unwrap_or_default().to_string();
            let items = (0..count).map(|_| json!(duration)).collect();
            Ok(OperationOutcome::value(OperationValue::PrimitiveCollection(items)))
        })
        .with_operation("AIRTCTTwoPrimParam", |ctx| {
            Ok(OperationOutcome::value(OperationValue::Complex(two_prim(ctx))))
        })
        .with_operation("AIRTCollCTTwoPrimParam", |ctx| {
            let count = ctx.int("ParameterInt16").unwrap_or(0).max(0);
            let items = (0..count).map(|_| two_prim(ctx)).collect();
            Ok(OperationOutcome::value(OperationValue::ComplexCollection(items)))
        })
        .with_operation("AIRTETTwoKeyTwoPrimParam", |ctx| {
            let id = ctx.int("ParameterInt16").unwrap_or(0);
            Ok(OperationOutcome::value(OperationValue::Entity(object(json!({
                "PropertyInt16": id,
                "PropertyString": "Test123"
            })))))
        })
        .with_operation("AIRTCollETKeyNavParam", |ctx| {
            let count = ctx.int("ParameterInt16").unwrap_or(0).max(0);
            let items = (1..=count)
                .map(|i| object(json!({"PropertyInt16": i, "PropertyString": format!("Item {}", i)})))
                .collect();
            Ok(OperationOutcome::value(OperationValue::EntityCollection(items)))
        })
        .with_operation("AIRTESAllPrimParam", |ctx| {
            let mut entity = object(all_prim_entity(3));
            if let Some(date) = ctx.str("ParameterDate") {
                entity.insert("PropertyDate".into(), json!(date));
            }
            Ok(OperationOutcome::created(entity))
        })
        .with_operation("AIRTCollESAllPrimParam", |_| {
            Ok(OperationOutcome::value(OperationValue::EntityCollection(vec![])))
        })
        .with_operation("FICRTString", |_: &InvocationContext<'_>| {
            Ok(OperationOutcome::primitive("FICRTString string value"))
        })
        .with_operation("BFCETAllPrimRTString", |ctx| match ctx.binding {
            Some(BoundInstance::Entity { data, .. }) => Ok(OperationOutcome::primitive(
                data.get("PropertyString").cloned().unwrap_or(Value::Null),
            )),
            _ => Err(ODataError::bad_request("expected an entity")),
        })
        .with_operation("BFCESAllPrimRTInt32", |ctx| match ctx.binding {
            Some(BoundInstance::Collection { entities, .. }) => {
                Ok(OperationOutcome::primitive(entities.len() as i64))
            }
            _ => Err(ODataError::bad_request("expected a collection")),
        })
        .with_async_operation("BAETAllPrimRTVoid", move |ctx| {
            let storage = writer.clone();
            Box::pin(async move {
                let Some(BoundInstance::Entity { key, data, .. }) = ctx.binding else {
                    return Err(ODataError::bad_request("expected an entity"));
                };
                let mut data = data.clone();
                data.insert(
                    "PropertyString".into(),
                    json!(ctx.str("ParameterString").unwrap_or_default()),
                );
                storage
                    .update(StorageKey::new("ETAllPrim", key.clone()), Value::Object(data))
                    .await
                    .map_err(ODataError::from)?;
                Ok(OperationOutcome::none())
            })
        })
        .build()
        .expect("technical service builds")
}

fn two_prim(ctx: &InvocationContext<'_>) -> Map<String, Value> {
    object(json!({
        "PropertyInt16": ctx.int("ParameterInt16").unwrap_or(0),
        "PropertyString": ctx.str("ParameterString").unwrap_or_default()
    }))
}

/// The technical service with `ESAllPrim(32767)`, `ESAllPrim(-32768)`, and
/// `ESAllPrim(0)` already created.
pub async fn seeded_tecsvc() -> TestService {
    let service = tecsvc();
    for id in [32767, -32768, 0] {
        let response = service
            .handle(ODataRequest::post(url("ESAllPrim")).with_json(&all_prim_entity(id)))
            .await;
        assert_eq!(response.status.as_u16(), 201, "seeding ESAllPrim({}): {}", id, response);
    }
    service
}

/// POST `body` to the action import `name`.
pub async fn call_action(service: &TestService, name: &str, body: Value) -> ODataResponse {
    service
        .handle(ODataRequest::post(url(name)).with_json(&body))
        .await
}
