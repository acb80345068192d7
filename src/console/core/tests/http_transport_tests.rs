//! HTTP transport against a mock REST backend.

use opsdesk_core::normalize::normalize;
use opsdesk_core::rbac::{PermissionStore, SubjectId};
use opsdesk_core::sync::ResourceSyncSlice;
use opsdesk_core::transport::{
    EntityId, Filters, HttpTransport, HttpTransportConfig, MutationOp, PermissionSource,
    ResourceKind, ResourceTransport, TransportError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> HttpTransport {
    let config = HttpTransportConfig::default().with_base_url(format!("{}/api", server.uri()));
    HttpTransport::new(config).unwrap()
}

fn clients() -> ResourceKind {
    ResourceKind::new("clients")
}

// ============================================================================
// Permissions
// ============================================================================

#[tokio::test]
async fn test_fetch_permissions_sends_subject_and_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/permissions"))
        .and(query_param("subjectId", "u-7"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "subjectId": "u-7",
                "modules": [{ "code": "HR_USERS", "canView": true, "active": true }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = HttpTransportConfig::default()
        .with_base_url(format!("{}/api", server.uri()))
        .with_bearer_token("secret-token");
    let transport = HttpTransport::new(config).unwrap();

    let manifest = transport
        .fetch_permissions(Some(&SubjectId::new("u-7")))
        .await
        .unwrap();
    assert_eq!(manifest.subject_id.as_str(), "u-7");
    assert_eq!(manifest.modules.len(), 1);
}

#[tokio::test]
async fn test_store_loads_through_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subjectId": "u-1",
            "modules": [{ "code": "CONTRACTING_CLIENTS", "canView": true, "canCreate": true, "active": true }]
        })))
        .mount(&server)
        .await;

    let store = PermissionStore::new(Arc::new(transport(&server)));
    store.load().await.unwrap();

    assert!(store.current_capability("CONTRACTING_CLIENTS").can_create);
    assert!(!store.current_capability("CONTRACTING_CLIENTS").can_delete);
}

#[tokio::test]
async fn test_malformed_manifest_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "modules": "nope" })))
        .mount(&server)
        .await;

    let err = transport(&server).fetch_permissions(None).await.unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
}

// ============================================================================
// Resources
// ============================================================================

#[tokio::test]
async fn test_fetch_list_sends_filters_and_unwraps_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/clients"))
        .and(query_param("city", "Cairo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{ "CLIENT_ID": 1 }, { "CLIENT_ID": 2 }],
            "total": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut filters = Filters::new();
    filters.insert("city".into(), "Cairo".into());

    let records = transport(&server).fetch_list(&clients(), &filters).await.unwrap();
    assert_eq!(records, vec![json!({ "CLIENT_ID": 1 }), json!({ "CLIENT_ID": 2 })]);
}

#[tokio::test]
async fn test_fetch_list_accepts_bare_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/hotels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "HOTEL_ID": 9 }])))
        .mount(&server)
        .await;

    let records = transport(&server)
        .fetch_list(&ResourceKind::new("hotels"), &Filters::new())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_fetch_list_rejects_non_list_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "CLIENT_ID": 1 })))
        .mount(&server)
        .await;

    let err = transport(&server)
        .fetch_list(&clients(), &Filters::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
}

#[tokio::test]
async fn test_fetch_one_uses_id_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/clients/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "CLIENT_ID": 42 } })))
        .mount(&server)
        .await;

    let record = transport(&server)
        .fetch_one(&clients(), &EntityId::from(42i64))
        .await
        .unwrap();
    assert_eq!(record, json!({ "CLIENT_ID": 42 }));
}

#[tokio::test]
async fn test_mutations_map_to_verbs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/clients"))
        .and(body_json(json!({ "NAME": "Acme" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "message": "Client created" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/clients/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "message": "Client saved" } })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/clients/3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport(&server);
    let id = EntityId::from(3i64);
    let payload = json!({ "NAME": "Acme" });

    let created = transport
        .mutate(&clients(), MutationOp::Create, None, Some(&payload))
        .await
        .unwrap();
    assert_eq!(created.message.as_deref(), Some("Client created"));

    let saved = transport
        .mutate(&clients(), MutationOp::Update, Some(&id), Some(&payload))
        .await
        .unwrap();
    assert_eq!(saved.message.as_deref(), Some("Client saved"));

    let deleted = transport
        .mutate(&clients(), MutationOp::Delete, Some(&id), None)
        .await
        .unwrap();
    assert!(deleted.message.is_none());
}

#[tokio::test]
async fn test_update_without_id_fails_before_sending() {
    let server = MockServer::start().await;

    let err = transport(&server)
        .mutate(&clients(), MutationOp::Update, None, Some(&json!({})))
        .await
        .unwrap_err();
    assert_eq!(normalize(&err), "update on clients requires an id");
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_error_status_carries_parsed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/clients"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "message": "Name taken" })))
        .mount(&server)
        .await;

    let err = transport(&server)
        .mutate(&clients(), MutationOp::Create, None, Some(&json!({})))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(409));
    assert_eq!(normalize(&err), "Name taken");
}

#[tokio::test]
async fn test_success_false_envelope_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": { "message": "Filter not supported" }
        })))
        .mount(&server)
        .await;

    let err = transport(&server)
        .fetch_list(&clients(), &Filters::new())
        .await
        .unwrap_err();
    assert_eq!(normalize(&err), "Filter not supported");
}

#[tokio::test]
async fn test_plain_text_error_body_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/clients/1"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad gateway"))
        .mount(&server)
        .await;

    let err = transport(&server)
        .fetch_one(&clients(), &EntityId::from(1i64))
        .await
        .unwrap_err();
    assert_eq!(normalize(&err), "Bad gateway");
}

#[tokio::test]
async fn test_timeout_is_reported_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/clients"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let mut config = HttpTransportConfig::default().with_base_url(format!("{}/api", server.uri()));
    config.timeout = Duration::from_millis(50);
    let transport = HttpTransport::new(config).unwrap();

    let err = transport
        .fetch_list(&clients(), &Filters::new())
        .await
        .unwrap_err();
    assert_eq!(normalize(&err), "Request timed out");
}

// ============================================================================
// End to end through a slice
// ============================================================================

#[tokio::test]
async fn test_slice_over_http_reports_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "CLIENT_ID": 1, "NAME": "Acme" }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/clients"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "errors": [{ "message": "NAME must be unique" }]
        })))
        .mount(&server)
        .await;

    let slice = ResourceSyncSlice::<Value>::spawn("clients", Arc::new(transport(&server)));
    slice.fetch_list(Filters::new()).await.unwrap();
    assert!(slice.create(json!({ "NAME": "Acme" })).await.is_err());

    let state = slice.snapshot();
    assert_eq!(state.collection.len(), 1);
    assert_eq!(state.error_text(), "NAME must be unique");
}
