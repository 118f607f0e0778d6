#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Kratos admin client wire behaviour against a mock HTTP server.

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use tenants::domain::ports::{IdentityDirectory, IdentityError};
use tenants::{KratosClient, KratosConfig};

fn client(server: &MockServer) -> KratosClient {
    KratosClient::new(&KratosConfig {
        admin_url: server.base_url(),
        request_timeout_secs: 5,
    })
    .unwrap()
}

#[test]
fn invalid_admin_url_is_a_config_error() {
    let err = KratosClient::new(&KratosConfig {
        admin_url: "not a url".to_owned(),
        ..KratosConfig::default()
    })
    .unwrap_err();

    assert!(matches!(err, IdentityError::Config(_)));
}

#[tokio::test]
async fn find_by_email_queries_credentials_identifier() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/admin/identities")
                .query_param("credentials_identifier", "a@example.com");
            then.status(200).json_body(json!([
                { "id": "id-1", "schema_id": "default", "traits": { "email": "a@example.com" } }
            ]));
        })
        .await;

    let found = client(&server)
        .find_by_email("a@example.com")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(found.id, "id-1");
    assert_eq!(found.email, "a@example.com");
    mock.assert_async().await;
}

#[tokio::test]
async fn find_by_email_treats_empty_and_missing_as_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/admin/identities")
                .query_param("credentials_identifier", "empty@example.com");
            then.status(200).json_body(json!([]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/admin/identities")
                .query_param("credentials_identifier", "gone@example.com");
            then.status(404)
                .json_body(json!({ "error": { "code": 404, "message": "not found" } }));
        })
        .await;
    let client = client(&server);

    assert!(client.find_by_email("empty@example.com").await.unwrap().is_none());
    assert!(client.find_by_email("gone@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn create_posts_default_schema_with_email_trait() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/admin/identities").json_body(json!({
                "schema_id": "default",
                "traits": { "email": "new@example.com" }
            }));
            then.status(201)
                .json_body(json!({ "id": "id-2", "traits": { "email": "new@example.com" } }));
        })
        .await;

    let created = client(&server).create("new@example.com").await.unwrap();

    assert_eq!(created.id, "id-2");
    mock.assert_async().await;
}

#[tokio::test]
async fn get_maps_404_to_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/admin/identities/missing");
            then.status(404);
        })
        .await;

    let err = client(&server).get("missing").await.unwrap_err();

    assert!(matches!(err, IdentityError::NotFound(id) if id == "missing"));
}

#[tokio::test]
async fn server_errors_carry_status_and_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/admin/identities/broken");
            then.status(500).json_body(json!({
                "error": { "code": 500, "message": "internal", "reason": "db down" }
            }));
        })
        .await;

    let err = client(&server).get("broken").await.unwrap_err();

    match err {
        IdentityError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "internal: db down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn recovery_code_sends_lifetime_in_seconds() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/admin/recovery/code").json_body(json!({
                "identity_id": "id-1",
                "expires_in": "7200s"
            }));
            then.status(201).json_body(json!({
                "recovery_link": "http://kratos/self-service/recovery?flow=f1",
                "recovery_code": "123456",
                "expires_at": "2030-01-01T00:00:00Z"
            }));
        })
        .await;

    let link = client(&server)
        .issue_recovery_link("id-1", Duration::from_secs(7200))
        .await
        .unwrap();

    assert_eq!(link.link, "http://kratos/self-service/recovery?flow=f1");
    assert_eq!(link.code, "123456");
    mock.assert_async().await;
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/admin/identities/odd");
            then.status(200).body("not json");
        })
        .await;

    let err = client(&server).get("odd").await.unwrap_err();

    assert!(matches!(err, IdentityError::Decode(_)));
}
