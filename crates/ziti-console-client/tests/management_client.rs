//! `ManagementClient` against a mock controller.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ziti_console_client::{ClientError, ManagementClient};
use ziti_console_core::api::{ListQuery, ManagementApi};
use ziti_console_core::config::ConsoleConfig;

const BASE: &str = "/edge/management/v1";

fn client(server: &MockServer) -> ManagementClient {
    let mut config = ConsoleConfig::new(server.uri()).with_session_token("session-123");
    config.validate().unwrap();
    ManagementClient::new(&config).unwrap()
}

#[tokio::test]
async fn list_sends_session_and_paging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/edge-routers")))
        .and(header("zt-session", "session-123"))
        .and(query_param("limit", "5"))
        .and(query_param("offset", "0"))
        .and(query_param("filter", "true sort by name asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "er1", "name": "router-a"}],
            "meta": {"pagination": {"limit": 5, "offset": 0, "totalCount": 12}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server)
        .list("edge-routers", &ListQuery::with_limit(5))
        .await
        .unwrap();

    assert_eq!(page.total_count, 12);
    assert_eq!(page.data, vec![json!({"id": "er1", "name": "router-a"})]);
}

#[tokio::test]
async fn list_related_uses_sub_resource_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/services/svc1/terminators")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server)
        .list_related("services", "svc1", "terminators", &ListQuery::with_limit(5))
        .await
        .unwrap();

    assert!(page.data.is_empty());
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn get_returns_data_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/edge-router-policies/erp1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "erp1", "name": "all", "semantic": "AnyOf"},
            "meta": {}
        })))
        .mount(&server)
        .await;

    let entity = client(&server).get("edge-router-policies", "erp1").await.unwrap();

    assert_eq!(entity["semantic"], "AnyOf");
}

#[tokio::test]
async fn not_found_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/services/missing")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "NOT_FOUND", "message": "The resource requested was not found or is no longer available"}
        })))
        .mount(&server)
        .await;

    let err = client(&server).get("services", "missing").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.code.as_deref(), Some("NOT_FOUND"));
}

#[tokio::test]
async fn create_posts_body_and_reads_id() {
    let server = MockServer::start().await;
    let body = json!({"name": "erp", "edgeRouterRoles": ["#east"], "semantic": "AnyOf"});
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/edge-router-policies")))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "erp-new", "_links": {}},
            "meta": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client(&server).create("edge-router-policies", &body).await.unwrap();

    assert_eq!(ack.id.as_deref(), Some("erp-new"));
}

#[tokio::test]
async fn update_patches_and_tolerates_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{BASE}/edge-router-policies/erp1")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client(&server)
        .update("edge-router-policies", "erp1", &json!({"name": "renamed"}))
        .await
        .unwrap();

    assert!(ack.id.is_none());
    assert!(ack.data.is_none());
}

#[tokio::test]
async fn create_reads_bare_id_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/services")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "svc9"})))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client(&server)
        .create("services", &json!({"name": "web"}))
        .await
        .unwrap();

    assert_eq!(ack.id.as_deref(), Some("svc9"));
}

#[tokio::test]
async fn re_enroll_posts_router_action() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/edge-routers/er1/re-enroll")))
        .and(header("zt-session", "session-123"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}, "meta": {}})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .action("edge-routers", "er1", "re-enroll", &json!({}))
        .await
        .unwrap();
}

#[tokio::test]
async fn validation_error_prefers_cause_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/edge-router-policies")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "COULD_NOT_VALIDATE",
                "message": "The supplied request contains an invalid document",
                "cause": {"field": "name", "reason": "name is not unique"}
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .create("edge-router-policies", &json!({"name": "dup"}))
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(400));
    assert_eq!(err.message, "name is not unique");
    assert_eq!(err.field.as_deref(), Some("name"));
}

#[tokio::test]
async fn unauthorized_is_reported_by_client() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{BASE}/api-sessions/s1")))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let err = client(&server).delete_entity("api-sessions", "s1").await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(matches!(err, ClientError::Api { ref message, .. } if message == "unauthorized"));
}
