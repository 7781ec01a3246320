//! Operations bound to an entity or an entity collection, addressed by plain
//! and namespace-qualified names.

mod common;

use common::builders::{BatchBuilder, response_frames};
use common::{seeded_tecsvc, url};
use http::{Method, StatusCode};
use odata_server::ODataRequest;
use odata_server::batch::BatchFrame;
use odata_server::http::CONTENT_TYPE;
use serde_json::json;

#[tokio::test]
async fn test_entity_bound_function() {
    let service = seeded_tecsvc().await;

    for path in [
        "ESAllPrim(0)/BFCETAllPrimRTString()",
        "ESAllPrim(0)/olingo.odata.test1.BFCETAllPrimRTString()",
    ] {
        let response = service.handle(ODataRequest::get(url(path))).await;
        assert_eq!(response.status, StatusCode::OK, "{}: {}", path, response);
        let body = response.body_json().unwrap();
        assert_eq!(body["value"], "First Resource - positive values");
        assert!(body["@odata.context"].as_str().unwrap().ends_with("$metadata#Edm.String"));
    }
}

#[tokio::test]
async fn test_collection_bound_function() {
    let service = seeded_tecsvc().await;

    for path in [
        "ESAllPrim/BFCESAllPrimRTInt32()",
        "ESAllPrim/olingo.odata.test1.BFCESAllPrimRTInt32()",
        "ESAllPrim/BFCESAllPrimRTInt32",
    ] {
        let response = service.handle(ODataRequest::get(url(path))).await;
        assert_eq!(response.status, StatusCode::OK, "{}: {}", path, response);
        assert_eq!(response.body_json().unwrap()["value"], 3);
    }
}

#[tokio::test]
async fn test_entity_bound_action_writes_through_storage() {
    let service = seeded_tecsvc().await;

    let response = service
        .handle(
            ODataRequest::post(url("ESAllPrim(32767)/olingo.odata.test1.BAETAllPrimRTVoid"))
                .with_json(&json!({"ParameterString": "changed"})),
        )
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT, "{}", response);

    let value = service
        .handle(ODataRequest::get(url("ESAllPrim(32767)/PropertyString/$value")))
        .await;
    assert_eq!(value.body_text(), "changed");

    let untouched = service
        .handle(ODataRequest::get(url("ESAllPrim(0)/PropertyString/$value")))
        .await;
    assert_eq!(untouched.body_text(), "First Resource - positive values");
}

#[tokio::test]
async fn test_bound_operation_errors() {
    let service = seeded_tecsvc().await;

    let missing = service
        .handle(ODataRequest::get(url("ESAllPrim(42)/BFCETAllPrimRTString()")))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let wrong_type = service
        .handle(ODataRequest::get(url(
            "ESTwoKeyTwoPrim(PropertyInt16=1,PropertyString='a')/BFCETAllPrimRTString()",
        )))
        .await;
    assert_eq!(wrong_type.status, StatusCode::NOT_FOUND);

    // bound to an entity, not to the collection
    let collection = service
        .handle(ODataRequest::get(url("ESAllPrim/BFCETAllPrimRTString()")))
        .await;
    assert_eq!(collection.status, StatusCode::NOT_FOUND);

    let action_by_get = service
        .handle(ODataRequest::get(url("ESAllPrim(0)/BAETAllPrimRTVoid")))
        .await;
    assert_eq!(action_by_get.status, StatusCode::METHOD_NOT_ALLOWED);

    let bad_parameter = service
        .handle(
            ODataRequest::post(url("ESAllPrim(0)/BAETAllPrimRTVoid"))
                .with_json(&json!({"ParameterString": 5})),
        )
        .await;
    assert_eq!(bad_parameter.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_parameter.body_json().unwrap()["error"]["code"], "INVALID_PARAMETER");
}

#[tokio::test]
async fn test_bound_operations_in_a_batch() {
    let service = seeded_tecsvc().await;
    let request = BatchBuilder::new()
        .frame(
            BatchFrame::new(Method::POST, "ESAllPrim(0)/BAETAllPrimRTVoid")
                .with_header(CONTENT_TYPE, "application/json")
                .with_body(json!({"ParameterString": "from batch"}).to_string()),
        )
        .get("ESAllPrim(0)/olingo.odata.test1.BFCETAllPrimRTString()")
        .get("ESAllPrim/BFCESAllPrimRTInt32()")
        .build();

    let response = service.handle(request).await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    let frames = response_frames(&response);
    let statuses: Vec<_> = frames.iter().map(|frame| frame.status).collect();
    assert_eq!(
        statuses,
        vec![StatusCode::NO_CONTENT, StatusCode::OK, StatusCode::OK]
    );

    let text: serde_json::Value = serde_json::from_slice(&frames[1].body).unwrap();
    assert_eq!(text["value"], "from batch");
}
