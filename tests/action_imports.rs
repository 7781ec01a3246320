//! Action import integration tests: one per return shape, plus the
//! parameter and method checks that guard invocation.

mod common;

use common::{call_action, tecsvc, url};
use http::StatusCode;
use odata_server::ODataRequest;
use odata_server::http::{LOCATION, ODATA_VERSION};
use serde_json::json;

#[tokio::test]
async fn test_primitive() {
    let service = tecsvc();
    let response = call_action(&service, "AIRTString", json!({})).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get(ODATA_VERSION), Some("4.0"));
    let body = response.body_json().unwrap();
    assert_eq!(body["value"], "UARTString string value");
    assert!(body["@odata.context"].as_str().unwrap().ends_with("$metadata#Edm.String"));
}

#[tokio::test]
async fn test_empty_body_counts_as_no_parameters() {
    let service = tecsvc();
    let response = service.handle(ODataRequest::post(url("AIRTString"))).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_primitive_collection() {
    let service = tecsvc();
    let response = call_action(
        &service,
        "AIRTCollStringTwoParam",
        json!({"ParameterInt16": 3, "ParameterDuration": "P1DT2H"}),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body_json().unwrap()["value"], json!(["P1DT2H", "P1DT2H", "P1DT2H"]));
}

#[tokio::test]
async fn test_complex() {
    let service = tecsvc();
    let response = call_action(
        &service,
        "AIRTCTTwoPrimParam",
        json!({"ParameterInt16": 16, "ParameterString": "Test123"}),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.body_json().unwrap();
    assert_eq!(body["PropertyInt16"], 16);
    assert_eq!(body["PropertyString"], "Test123");
    assert!(body["@odata.context"].as_str().unwrap().ends_with("olingo.odata.test1.CTTwoPrim"));
}

#[tokio::test]
async fn test_complex_collection() {
    let service = tecsvc();
    let response = call_action(
        &service,
        "AIRTCollCTTwoPrimParam",
        json!({"ParameterInt16": 2, "ParameterString": "x"}),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let items = response.body_json().unwrap()["value"].as_array().unwrap().clone();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["PropertyString"], "x");
}

#[tokio::test]
async fn test_entity() {
    let service = tecsvc();
    let response = call_action(&service, "AIRTETTwoKeyTwoPrimParam", json!({"ParameterInt16": -365})).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.body_json().unwrap();
    assert_eq!(body["PropertyInt16"], -365);
    assert_eq!(body["PropertyString"], "Test123");
}

#[tokio::test]
async fn test_entity_collection_including_empty() {
    let service = tecsvc();
    let response = call_action(
        &service,
        "AIRTCollETKeyNavParam",
        json!({"ParameterInt16": 3, "ParameterDuration": "PT0S"}),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body_json().unwrap()["value"].as_array().unwrap().len(), 3);

    let response = call_action(
        &service,
        "AIRTCollETKeyNavParam",
        json!({"ParameterInt16": 0, "ParameterDuration": "PT0S"}),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body_json().unwrap()["value"], json!([]));
}

#[tokio::test]
async fn test_created_entity_in_entity_set() {
    let service = tecsvc();
    let response = call_action(&service, "AIRTESAllPrimParam", json!({"ParameterDate": "2013-12-12"})).await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.headers.get(LOCATION), Some(url("ESAllPrim(3)").as_str()));
    assert_eq!(response.body_json().unwrap()["PropertyDate"], "2013-12-12");

    let stored = service.handle(ODataRequest::get(url("ESAllPrim(3)"))).await;
    assert_eq!(stored.status, StatusCode::OK);
}

#[tokio::test]
async fn test_empty_entity_set_collection() {
    let service = tecsvc();
    let response = call_action(
        &service,
        "AIRTCollESAllPrimParam",
        json!({"ParameterTimeOfDay": "12:23:34"}),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.body_json().unwrap();
    assert_eq!(body["value"], json!([]));
    assert!(body["@odata.context"].as_str().unwrap().ends_with("$metadata#ESAllPrim"));
}

#[tokio::test]
async fn test_parameter_errors() {
    let service = tecsvc();

    let unknown = call_action(&service, "AIRTString", json!({"Unknown": 1})).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.body_json().unwrap()["error"]["code"], "INVALID_PARAMETER");

    let missing = call_action(&service, "AIRTCTTwoPrimParam", json!({"ParameterInt16": 1})).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let out_of_range = call_action(
        &service,
        "AIRTCTTwoPrimParam",
        json!({"ParameterInt16": 40000, "ParameterString": "x"}),
    )
    .await;
    assert_eq!(out_of_range.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_function_needs_get_and_action_needs_post() {
    let service = tecsvc();

    let function = service.handle(ODataRequest::get(url("FICRTString()"))).await;
    assert_eq!(function.status, StatusCode::OK);
    assert_eq!(function.body_json().unwrap()["value"], "FICRTString string value");

    let unknown = service.handle(ODataRequest::get(url("FICRTString(Bogus=1)"))).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);

    let posted = service.handle(ODataRequest::post(url("FICRTString()"))).await;
    assert_eq!(posted.status, StatusCode::METHOD_NOT_ALLOWED);

    let got = service.handle(ODataRequest::get(url("AIRTString"))).await;
    assert_eq!(got.status, StatusCode::METHOD_NOT_ALLOWED);
}
