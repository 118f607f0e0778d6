#![allow(clippy::unwrap_used, clippy::expect_used)]

//! OpenFGA client wire behaviour against a mock HTTP server.

use httpmock::prelude::*;
use secrecy::SecretString;
use serde_json::json;
use tenant_authz::{Authorizer, MODEL_V0, OpenFgaClient, OpenFgaConfig};
use tenant_authz_sdk::{AuthorizationModel, AuthzError, Tuple, TupleFilter, TupleStore};

fn client(server: &MockServer, model_id: Option<&str>) -> OpenFgaClient {
    let cfg = OpenFgaConfig {
        enabled: true,
        api_scheme: "http".to_owned(),
        api_host: format!("{}:{}", server.host(), server.port()),
        store_id: "store1".to_owned(),
        api_token: Some(SecretString::from("s3cret".to_owned())),
        model_id: model_id.map(ToOwned::to_owned),
        read_page_size: 2,
        ..OpenFgaConfig::default()
    };
    OpenFgaClient::new(&cfg).unwrap()
}

#[test]
fn missing_store_id_is_a_config_error() {
    let err = OpenFgaClient::new(&OpenFgaConfig::default()).unwrap_err();
    assert!(matches!(err, AuthzError::Config(_)));
}

#[tokio::test]
async fn check_sends_tuple_and_contextual_tuples() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/stores/store1/check")
                .header("authorization", "Bearer s3cret")
                .json_body(json!({
                    "tuple_key": { "user": "user:u1", "relation": "owner", "object": "tenant:t1" },
                    "contextual_tuples": { "tuple_keys": [
                        { "user": "user:u1", "relation": "member", "object": "tenant:t1" }
                    ]},
                    "authorization_model_id": "model1"
                }));
            then.status(200).json_body(json!({ "allowed": true }));
        })
        .await;

    let allowed = client(&server, Some("model1"))
        .check(
            "user:u1",
            "owner",
            "tenant:t1",
            &[Tuple::new("user:u1", "member", "tenant:t1")],
        )
        .await
        .unwrap();

    assert!(allowed);
    mock.assert_async().await;
}

#[tokio::test]
async fn write_ignores_duplicates() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/stores/store1/write").json_body(json!({
                "writes": {
                    "tuple_keys": [{ "user": "user:u1", "relation": "owner", "object": "tenant:t1" }],
                    "on_duplicate": "ignore"
                }
            }));
            then.status(200).json_body(json!({}));
        })
        .await;

    client(&server, None)
        .write_tuple(&Tuple::new("user:u1", "owner", "tenant:t1"))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn batch_delete_ignores_missing() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/stores/store1/write").json_body(json!({
                "deletes": {
                    "tuple_keys": [
                        { "user": "user:a", "relation": "member", "object": "tenant:t1" },
                        { "user": "user:b", "relation": "owner", "object": "tenant:t1" }
                    ],
                    "on_missing": "ignore"
                }
            }));
            then.status(200).json_body(json!({}));
        })
        .await;

    client(&server, None)
        .delete_tuples(&[
            Tuple::new("user:a", "member", "tenant:t1"),
            Tuple::new("user:b", "owner", "tenant:t1"),
        ])
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn read_passes_filter_page_size_and_token() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/stores/store1/read").json_body(json!({
                "tuple_key": { "object": "tenant:t1" },
                "page_size": 2,
                "continuation_token": "abc"
            }));
            then.status(200).json_body(json!({
                "tuples": [
                    { "key": { "user": "user:a", "relation": "member", "object": "tenant:t1" },
                      "timestamp": "2025-01-01T00:00:00Z" }
                ],
                "continuation_token": ""
            }));
        })
        .await;

    let page = client(&server, None)
        .read_tuples(&TupleFilter::object("tenant:t1"), "abc")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(page.tuples, vec![Tuple::new("user:a", "member", "tenant:t1")]);
    assert!(page.continuation_token.is_empty());
}

#[tokio::test]
async fn api_errors_carry_status_and_code() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/stores/store1/list-objects");
            then.status(400).json_body(json!({
                "code": "validation_error",
                "message": "type 'tenant' not found"
            }));
        })
        .await;

    let err = client(&server, None)
        .list_objects("user:u1", "owner", "tenant")
        .await
        .unwrap_err();

    match err {
        AuthzError::Api { status, code, message } => {
            assert_eq!(status, 400);
            assert_eq!(code, "validation_error");
            assert!(message.contains("not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn pinned_model_is_compared_against_expected() {
    let server = MockServer::start_async().await;
    let mut loaded: serde_json::Value = serde_json::from_str(MODEL_V0).unwrap();
    loaded["id"] = json!("model1");
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/stores/store1/authorization-models/model1");
            then.status(200)
                .json_body(json!({ "authorization_model": loaded.clone() }));
        })
        .await;

    let store = std::sync::Arc::new(client(&server, Some("model1")));
    let authz = Authorizer::new(store).unwrap();

    authz.validate_model().await.unwrap();
}

#[tokio::test]
async fn latest_model_mismatch_fails_validation() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/stores/store1/authorization-models")
                .query_param("page_size", "1");
            then.status(200).json_body(json!({
                "authorization_models": [
                    { "id": "old", "schema_version": "1.1", "type_definitions": [{ "type": "user" }] }
                ]
            }));
        })
        .await;

    let store = std::sync::Arc::new(client(&server, None));
    let expected = AuthorizationModel::from_json(MODEL_V0).unwrap();
    assert!(!store.compare_model(&expected).await.unwrap());

    let err = Authorizer::new(store).unwrap().validate_model().await.unwrap_err();
    assert!(matches!(err, AuthzError::InvalidAuthorizationModel(_)));
}

#[tokio::test]
async fn unreachable_store_is_a_transport_error() {
    let cfg = OpenFgaConfig {
        enabled: true,
        api_host: "127.0.0.1:1".to_owned(),
        store_id: "store1".to_owned(),
        request_timeout_secs: 1,
        ..OpenFgaConfig::default()
    };
    let err = OpenFgaClient::new(&cfg)
        .unwrap()
        .write_tuple(&Tuple::new("user:u1", "owner", "tenant:t1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::Transport(_)));
}
