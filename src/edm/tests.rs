//! Tests for model construction, lookup, and payload checks.

use super::*;
use crate::error::ODataError;
use serde_json::{Map, Value, json};

fn customer_order_model() -> EdmModelBuilder {
    EdmModel::builder("Shop")
        .entity_type(
            EntityType::new("Customer")
                .with_key_property("Id", PrimitiveKind::Int32)
                .with_property(Property::primitive("Name", PrimitiveKind::String).not_null())
                .with_navigation(
                    NavigationProperty::new("Orders", "Order", Multiplicity::Many)
                        .with_partner("Customer"),
                ),
        )
        .entity_type(
            EntityType::new("Order")
                .with_key_property("OrderId", PrimitiveKind::Int32)
                .with_property(Property::primitive("CustomerId", PrimitiveKind::Int32))
                .with_navigation(
                    NavigationProperty::new("Customer", "Customer", Multiplicity::ZeroOrOne)
                        .with_partner("Orders")
                        .with_constraint("CustomerId", "Id"),
                ),
        )
        .entity_set(EntitySet::new("Customers", "Customer").with_binding("Orders", "Orders"))
        .entity_set(EntitySet::new("Orders", "Order").with_binding("Customer", "Customers"))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

#[test]
fn test_valid_model_builds() {
    let model = customer_order_model().build().expect("model should build");
    assert_eq!(model.namespace(), "Shop");
    assert_eq!(model.entity_sets().count(), 2);
    assert!(model.resolve_entity_type("Shop.Customer").is_ok());
    assert!(model.resolve_entity_type("Customer").is_ok());

    let customers = model.entity_set("Customers").unwrap();
    let orders = model.binding_target(customers, "Orders").unwrap();
    assert_eq!(orders.name, "Orders");
}

#[test]
fn test_unknown_entity_set_is_not_found() {
    let model = customer_order_model().build().unwrap();
    let err = model.entity_set("Nope").unwrap_err();
    assert!(matches!(err, ODataError::NotFound { .. }));
}

#[test]
fn test_partner_must_point_back() {
    let result = EdmModel::builder("Shop")
        .entity_type(
            EntityType::new("A")
                .with_key_property("Id", PrimitiveKind::Int32)
                .with_navigation(NavigationProperty::new("ToB", "B", Multiplicity::One).with_partner("ToA")),
        )
        .entity_type(
            EntityType::new("B")
                .with_key_property("Id", PrimitiveKind::Int32)
                .with_navigation(NavigationProperty::new("ToA", "B", Multiplicity::One)),
        )
        .build();

    assert!(matches!(
        result,
        Err(EdmError::InconsistentPartner { ref navigation, .. }) if navigation == "ToB"
    ));
}

#[test]
fn test_nullable_key_rejected() {
    let mut entity_type = EntityType::new("Broken")
        .with_property(Property::primitive("Id", PrimitiveKind::Int32));
    entity_type.key.push("Id".into());

    let result = EdmModel::builder("Ns").entity_type(entity_type).build();
    assert!(matches!(result, Err(EdmError::InvalidKeyProperty { .. })));
}

#[test]
fn test_missing_key_and_unknown_key_property() {
    let result = EdmModel::builder("Ns")
        .entity_type(EntityType::new("NoKey"))
        .build();
    assert!(matches!(result, Err(EdmError::MissingKey { .. })));

    let mut entity_type = EntityType::new("Ghost");
    entity_type.key.push("Missing".into());
    let result = EdmModel::builder("Ns").entity_type(entity_type).build();
    assert!(matches!(result, Err(EdmError::UnknownKeyProperty { .. })));
}

#[test]
fn test_double_key_rejected() {
    let result = EdmModel::builder("Ns")
        .entity_type(EntityType::new("Measure").with_key_property("Value", PrimitiveKind::Double))
        .build();
    assert!(matches!(result, Err(EdmError::InvalidKeyProperty { .. })));
}

#[test]
fn test_binding_to_wrong_set_type_rejected() {
    let result = customer_order_model()
        .entity_set(EntitySet::new("Bad", "Customer").with_binding("Orders", "Customers"))
        .build();
    assert!(matches!(result, Err(EdmError::InvalidBinding { .. })));
}

#[test]
fn test_unknown_constraint_property_rejected() {
    let result = EdmModel::builder("Ns")
        .entity_type(
            EntityType::new("A")
                .with_key_property("Id", PrimitiveKind::Int32)
                .with_navigation(
                    NavigationProperty::new("Self", "A", Multiplicity::ZeroOrOne)
                        .with_constraint("ParentId", "Id"),
                ),
        )
        .build();
    assert!(matches!(
        result,
        Err(EdmError::UnknownConstraintProperty { ref property, .. }) if property == "ParentId"
    ));
}

#[test]
fn test_duplicate_parameter_and_ambiguous_overload() {
    let result = EdmModel::builder("Ns")
        .operation(
            Operation::action("A")
                .with_parameter(Parameter::primitive("P", PrimitiveKind::Int16))
                .with_parameter(Parameter::primitive("P", PrimitiveKind::Int16)),
        )
        .build();
    assert!(matches!(result, Err(EdmError::DuplicateParameter { .. })));

    let result = EdmModel::builder("Ns")
        .operation(Operation::function("F").with_parameter(Parameter::primitive("P", PrimitiveKind::Int16)))
        .operation(Operation::function("F").with_parameter(Parameter::primitive("P", PrimitiveKind::Int16)))
        .build();
    assert!(matches!(result, Err(EdmError::AmbiguousOverload { .. })));
}

#[test]
fn test_overload_resolution_by_parameter_types() {
    let model = EdmModel::builder("Ns")
        .operation(
            Operation::function("F")
                .with_parameter(Parameter::primitive("P", PrimitiveKind::Int16))
                .returns(ReturnType::Primitive(PrimitiveKind::Int16)),
        )
        .operation(
            Operation::function("F")
                .with_parameter(Parameter::primitive("P", PrimitiveKind::String))
                .returns(ReturnType::Primitive(PrimitiveKind::String)),
        )
        .build()
        .unwrap();

    let fits = |value: Value| {
        move |op: &Operation| {
            let p = &op.parameters[0];
            conforms(&p.parameter_type, &value)
        }
    };
    let text = model
        .resolve_overload_with("F", &OperationBinding::Unbound, &["P"], fits(json!("x")))
        .unwrap();
    assert_eq!(
        text.return_type,
        Some(ReturnType::Primitive(PrimitiveKind::String))
    );
    let number = model
        .resolve_overload_with("F", &OperationBinding::Unbound, &["P"], fits(json!(7)))
        .unwrap();
    assert_eq!(
        number.return_type,
        Some(ReturnType::Primitive(PrimitiveKind::Int16))
    );
    assert!(
        model
            .resolve_overload_with("F", &OperationBinding::Unbound, &["P"], |_| false)
            .is_err()
    );
}

fn conforms(property_type: &PropertyType, value: &Value) -> bool {
    match property_type {
        PropertyType::Primitive(kind) => kind.validate(value).is_ok(),
        PropertyType::Complex(_) => value.is_object(),
    }
}

#[test]
fn test_qualified_binding_is_stored_unqualified() {
    let model = customer_order_model()
        .operation(
            Operation::function("Total")
                .bound_to(OperationBinding::Entity("Shop.Order".into()))
                .returns(ReturnType::Primitive(PrimitiveKind::Int32)),
        )
        .build()
        .unwrap();

    let total = &model.operations_named("Total")[0];
    assert_eq!(total.binding, OperationBinding::Entity("Order".into()));
    assert!(
        model
            .resolve_overload("Total", &OperationBinding::Entity("Order".into()), &[])
            .is_ok()
    );
    assert!(
        model
            .resolve_overload("Total", &OperationBinding::Entity("Shop.Order".into()), &[])
            .is_ok()
    );
}

#[test]
fn test_overload_resolution_by_parameter_names() {
    let model = EdmModel::builder("Ns")
        .operation(
            Operation::function("F")
                .with_parameter(Parameter::primitive("A", PrimitiveKind::Int16))
                .returns(ReturnType::Primitive(PrimitiveKind::Int16)),
        )
        .operation(
            Operation::function("F")
                .with_parameter(Parameter::primitive("A", PrimitiveKind::Int16))
                .with_parameter(Parameter::primitive("B", PrimitiveKind::Int16))
                .returns(ReturnType::Primitive(PrimitiveKind::Int16)),
        )
        .build()
        .unwrap();

    let two = model
        .resolve_overload("F", &OperationBinding::Unbound, &["B", "A"])
        .unwrap();
    assert_eq!(two.parameters.len(), 2);
    let one = model
        .resolve_overload("Ns.F", &OperationBinding::Unbound, &["A"])
        .unwrap();
    assert_eq!(one.parameters.len(), 1);
    assert!(
        model
            .resolve_overload("F", &OperationBinding::Unbound, &["C"])
            .is_err()
    );
}

#[test]
fn test_resolve_bound_operation() {
    let model = customer_order_model()
        .operation(
            Operation::action("Archive")
                .bound_to(OperationBinding::Entity("Order".into())),
        )
        .build()
        .unwrap();

    assert!(model.resolve_operation("Archive", Some("Order")).is_ok());
    assert!(model.resolve_operation("Archive", Some("Shop.Order")).is_ok());
    assert!(model.resolve_operation("Archive", None).is_err());
}

#[test]
fn test_parse_composite_key_any_order() {
    let model = EdmModel::builder("Ns")
        .entity_type(
            EntityType::new("Message")
                .with_key_property("FromUsername", PrimitiveKind::String)
                .with_key_property("MessageId", PrimitiveKind::Int32),
        )
        .build()
        .unwrap();
    let entity_type = model.resolve_entity_type("Message").unwrap();

    let key = model
        .parse_key(
            entity_type,
            &[
                (Some("MessageId".into()), "100".into()),
                (Some("FromUsername".into()), "'fromusername'".into()),
            ],
        )
        .unwrap();
    assert_eq!(key.to_predicate(), "(FromUsername='fromusername',MessageId=100)");

    let err = model
        .parse_key(entity_type, &[(Some("MessageId".into()), "100".into())])
        .unwrap_err();
    assert!(matches!(err, ODataError::InvalidKey { .. }));
}

#[test]
fn test_extract_key_from_payload() {
    let model = customer_order_model().build().unwrap();
    let customer = model.resolve_entity_type("Customer").unwrap();

    let key = model
        .extract_key(customer, &object(json!({"Id": 7, "Name": "Ann"})))
        .unwrap();
    assert_eq!(key, EntityKey::single("Id", KeyValue::Integer(7)));

    assert!(model.extract_key(customer, &object(json!({"Name": "Ann"}))).is_err());
    assert!(
        model
            .extract_key(customer, &object(json!({"Id": "7"})))
            .is_err()
    );
}

#[test]
fn test_validate_entity_modes() {
    let model = customer_order_model().build().unwrap();
    let customer = model.resolve_entity_type("Customer").unwrap();

    let partial = object(json!({"Name": "Bob"}));
    assert!(
        model
            .validate_entity(customer, &partial, EntityValidation::Partial)
            .is_ok()
    );
    let err = model
        .validate_entity(customer, &partial, EntityValidation::Complete)
        .unwrap_err();
    assert!(matches!(err, ODataError::Validation { ref property, .. } if property == "Id"));

    let unknown = object(json!({"Id": 1, "Name": "Bob", "Shoe": 42}));
    assert!(
        model
            .validate_entity(customer, &unknown, EntityValidation::Complete)
            .is_err()
    );

    let null_name = object(json!({"Id": 1, "Name": null}));
    assert!(
        model
            .validate_entity(customer, &null_name, EntityValidation::Partial)
            .is_err()
    );
}

#[test]
fn test_complex_property_validation() {
    let model = EdmModel::builder("Ns")
        .complex_type(ComplexType::new(
            "Address",
            vec![
                Property::primitive("City", PrimitiveKind::String).with_max_length(5),
                Property::primitive("Zip", PrimitiveKind::Int32),
            ],
        ))
        .entity_type(
            EntityType::new("Person")
                .with_key_property("Id", PrimitiveKind::Int32)
                .with_property(Property::complex("Address", "Address")),
        )
        .build()
        .unwrap();
    let person = model.resolve_entity_type("Person").unwrap();

    let ok = object(json!({"Id": 1, "Address": {"City": "Oslo", "Zip": 150}}));
    assert!(model.validate_entity(person, &ok, EntityValidation::Complete).is_ok());

    let bad = object(json!({"Id": 1, "Address": {"City": "Oslo", "Zip": "150"}}));
    let err = model
        .validate_entity(person, &bad, EntityValidation::Complete)
        .unwrap_err();
    assert!(matches!(err, ODataError::Validation { ref property, .. } if property == "Address/Zip"));
}

#[test]
fn test_unknown_complex_type_rejected() {
    let result = EdmModel::builder("Ns")
        .entity_type(
            EntityType::new("Person")
                .with_key_property("Id", PrimitiveKind::Int32)
                .with_property(Property::complex("Address", "Missing")),
        )
        .build();
    assert!(matches!(result, Err(EdmError::UnknownType { .. })));
}

#[test]
fn test_model_serializes_for_metadata() {
    let model = customer_order_model().build().unwrap();
    let json = serde_json::to_value(&model).unwrap();
    assert_eq!(json["namespace"], "Shop");
    assert_eq!(json["entityTypes"]["Customer"]["key"], json!(["Id"]));
    assert_eq!(
        json["entityTypes"]["Customer"]["properties"][0]["type"],
        "Edm.Int32"
    );
}
