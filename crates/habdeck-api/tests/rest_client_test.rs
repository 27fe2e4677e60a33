#![allow(clippy::unwrap_used)]
// Integration tests for `RestClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use habdeck_api::{Error, RestClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/rest", server.uri())).unwrap();
    let client = RestClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

// ── Item directory ──────────────────────────────────────────────────

#[tokio::test]
async fn test_list_item_names() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/items"))
        .and(query_param("fields", "name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "Kitchen_Light" },
            { "name": "Bedroom_Dimmer" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let names = client.list_item_names().await.unwrap();
    assert_eq!(names, vec!["Kitchen_Light", "Bedroom_Dimmer"]);
}

#[tokio::test]
async fn test_list_item_names_rejects_non_json() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/items"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = client.list_item_names().await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}

// ── Item snapshots ──────────────────────────────────────────────────

#[tokio::test]
async fn test_get_item() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/items/Living_Dimmer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Living_Dimmer",
            "state": "35",
            "type": "Dimmer",
            "label": "Living room",
            "tags": []
        })))
        .mount(&server)
        .await;

    let item = client.get_item("Living_Dimmer").await.unwrap();
    assert_eq!(item.name, "Living_Dimmer");
    assert_eq!(item.state, "35");
    assert_eq!(item.item_type.as_deref(), Some("Dimmer"));
}

#[tokio::test]
async fn test_get_item_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/items/Missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "message": "Item Missing does not exist!", "http-code": 404 }
        })))
        .mount(&server)
        .await;

    let err = client.get_item("Missing").await.unwrap_err();
    assert!(err.is_not_found());
    match err {
        Error::Http { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Item Missing does not exist!");
        }
        other => panic!("expected Http error, got: {other:?}"),
    }
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_command_posts_plain_text() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/items/Kitchen_Light"))
        .and(header("content-type", "text/plain"))
        .and(body_string("ON"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.send_command("Kitchen_Light", "ON").await.unwrap();
}

#[tokio::test]
async fn test_send_command_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/items/Kitchen_Light"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.send_command("Kitchen_Light", "OFF").await.unwrap_err();
    assert!(err.is_transient());
}

// ── Auth ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/items/Lamp"))
        .and(header("authorization", "Bearer oh.token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "name": "Lamp", "state": "OFF" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport =
        TransportConfig::default().with_api_token(secrecy::SecretString::from("oh.token".to_string()));
    let base_url = Url::parse(&format!("{}/rest", server.uri())).unwrap();
    let client = RestClient::new(base_url, &transport).unwrap();

    let item = client.get_item("Lamp").await.unwrap();
    assert_eq!(item.state, "OFF");
}
