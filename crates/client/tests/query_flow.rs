//! Discovery, metadata, and query flows against a mock gateway.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use datagate_client::{GatewayClient, GatewayConfig};
use datagate_core::{GatewayError, QueryRequest};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn access_token() -> String {
    let exp = Utc::now().timestamp() + 3600;
    let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": "u1", "exp": exp }).to_string());
    format!("hdr.{payload}.sig")
}

async fn mock_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "access-token": token, "refresh-token": "ref-1" }
        })))
        .mount(server)
        .await;
}

async fn client_for(server: &MockServer) -> (GatewayClient, String) {
    let token = access_token();
    mock_login(server, &token).await;

    let config = GatewayConfig::builder(server.uri())
        .credentials("ada", "secret", 42)
        .base_backoff(Duration::from_millis(5))
        .disable_cache()
        .build()
        .unwrap();
    (GatewayClient::new(config).unwrap(), token)
}

#[tokio::test]
async fn list_entities_parses_the_discovery_envelope() {
    let server = MockServer::start().await;
    let (client, token) = client_for(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/meta/apis"))
        .and(header("Authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "apiScope": "ops", "apiUrl": "ops/auditTrail",
                  "externalAPIName": "Audit Trail", "description": "Change history" },
                { "apiScope": "config", "apiUrl": "config/configDataEntities",
                  "externalAPIName": "Config Entities" },
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = client.list_entities().await.unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.scopes(), vec!["config", "ops"]);
    assert_eq!(
        catalog.find("ops/auditTrail").map(|e| e.name.as_str()),
        Some("Audit Trail")
    );
}

#[tokio::test]
async fn entity_schema_parses_fields_and_flags() {
    let server = MockServer::start().await;
    let (client, _token) = client_for(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/meta/ops/auditTrail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "fieldName": "id", "type": "BigInt", "isPrimaryKey": true,
                  "fieldCanbeNull": false },
                { "fieldName": "action", "type": "String" },
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let schema = client.entity_schema("ops/auditTrail").await.unwrap();
    assert_eq!(schema.len(), 2);
    assert_eq!(schema.primary_keys(), vec!["id"]);
    assert!(schema.field("action").unwrap().is_nullable);
}

#[tokio::test]
async fn query_posts_the_canonical_body_with_bearer_auth() {
    let server = MockServer::start().await;
    let (client, token) = client_for(&server).await;

    let expected_body = json!({
        "criteriaList": [
            { "key": "status", "operation": "=", "value": "active" },
            { "key": "tenantId", "operation": "=", "value": 7, "prefixOperation": "AND" },
        ],
        "orderByList": [ { "column": "createdAt", "sortOrder": "DESC" } ],
        "selectFieldsList": ["id", "status"],
        "offset": 0,
        "limit": 50,
    });

    Mock::given(method("POST"))
        .and(path("/api/v1/ops/auditTrail/query"))
        .and(header("Authorization", format!("Bearer {token}").as_str()))
        .and(body_json(&expected_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [ { "id": 1, "status": "active" } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = QueryRequest::new()
        .filter("status", "=", "active")
        .filter_with("tenantId", "=", 7, datagate_core::LogicalOperator::And)
        .sort("createdAt", "desc")
        .select_fields(["id", "status"])
        .limit(50)
        .unwrap();

    let result = client.query("ops/auditTrail", request).await.unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.records[0].get("status"), Some(&json!("active")));
}

#[tokio::test]
async fn missing_entity_maps_404_to_entity_not_found_without_retry() {
    let server = MockServer::start().await;
    let (client, _token) = client_for(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/ops/missing/query"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "unknown entity"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/meta/ops/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.query("ops/missing", QueryRequest::new()).await.unwrap_err();
    assert!(matches!(err, GatewayError::EntityNotFound(ref e) if e == "ops/missing"));

    let err = client.entity_schema("ops/missing").await.unwrap_err();
    assert!(matches!(err, GatewayError::EntityNotFound(_)));
}

#[tokio::test]
async fn transient_server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    let (client, _token) = client_for(&server).await;

    let responses = std::sync::atomic::AtomicUsize::new(0);
    Mock::given(method("POST"))
        .and(path("/api/v1/ops/auditTrail/query"))
        .respond_with(move |_: &Request| {
            if responses.fetch_add(1, std::sync::atomic::Ordering::SeqCst) < 2 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({ "data": [ { "id": 1 } ] }))
            }
        })
        .expect(3)
        .mount(&server)
        .await;

    let result = client.query("ops/auditTrail", QueryRequest::new()).await.unwrap();
    assert_eq!(result.len(), 1);
}

#[tokio::test]
async fn exhausted_server_errors_surface_with_query_context() {
    let server = MockServer::start().await;
    mock_login(&server, &access_token()).await;

    // max_retries=1 keeps this test to two attempts.
    let config = GatewayConfig::builder(server.uri())
        .credentials("ada", "secret", 42)
        .max_retries(1)
        .base_backoff(Duration::from_millis(5))
        .disable_cache()
        .build()
        .unwrap();
    let client = GatewayClient::new(config).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/v1/ops/auditTrail/query"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "message": "upstream unavailable"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let err = client.query("ops/auditTrail", QueryRequest::new()).await.unwrap_err();
    match err {
        GatewayError::Query { entity, source } => {
            assert_eq!(entity, "ops/auditTrail");
            assert_eq!(source.status(), Some(503));
        }
        other => panic!("expected Query context, got {other:?}"),
    }
}

#[tokio::test]
async fn query_all_drains_25_records_in_three_pages() {
    let server = MockServer::start().await;
    let (client, _token) = client_for(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/ops/auditTrail/query"))
        .respond_with(|req: &Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            let offset = body["offset"].as_u64().unwrap() as usize;
            let limit = body["limit"].as_u64().unwrap() as usize;
            let total = 25usize;
            let end = (offset + limit).min(total);
            let records: Vec<_> =
                (offset.min(total)..end).map(|id| json!({ "id": id })).collect();
            ResponseTemplate::new(200).set_body_json(json!({ "data": records }))
        })
        .expect(3)
        .mount(&server)
        .await;

    let request = QueryRequest::new().limit(10).unwrap();
    let records = client.query_all("ops/auditTrail", request, None).await.unwrap();

    assert_eq!(records.len(), 25);
    assert_eq!(records[0].get("id"), Some(&json!(0)));
    assert_eq!(records[24].get("id"), Some(&json!(24)));
}

#[tokio::test]
async fn query_all_honors_the_record_cap() {
    let server = MockServer::start().await;
    let (client, _token) = client_for(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/ops/auditTrail/query"))
        .respond_with(|req: &Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            let offset = body["offset"].as_u64().unwrap();
            let limit = body["limit"].as_u64().unwrap();
            let records: Vec<_> =
                (offset..offset + limit).map(|id| json!({ "id": id })).collect();
            ResponseTemplate::new(200).set_body_json(json!({ "data": records }))
        })
        .expect(2)
        .mount(&server)
        .await;

    let request = QueryRequest::new().limit(10).unwrap();
    let records = client.query_all("ops/auditTrail", request, Some(15)).await.unwrap();
    assert_eq!(records.len(), 15);
}

#[tokio::test]
async fn null_data_payload_yields_an_empty_page() {
    let server = MockServer::start().await;
    let (client, _token) = client_for(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/ops/auditTrail/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": null })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.query("ops/auditTrail", QueryRequest::new()).await.unwrap();
    assert!(result.is_empty());
}
