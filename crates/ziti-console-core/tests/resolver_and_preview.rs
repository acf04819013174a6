//! Named-attribute resolution ordering and associated-entity previews.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use ziti_console_core::api::{ManagementApi, Page};
use ziti_console_core::error::{ApiError, ConsoleError};
use ziti_console_core::models::{RoleCategory, Semantic, Service};
use ziti_console_core::named::NamedAttributeMap;
use ziti_console_core::preview::{AssociatedEntityFetcher, FilterValue, MORE_RESULTS};
use ziti_console_core::resolver::NamedAttributeResolver;
use ziti_console_core::roles::RoleSelection;
use ziti_console_testkit::{FakeManagementApi, fixtures};

fn page(items: Vec<serde_json::Value>) -> Page {
    let total_count = items.len() as u64;
    Page {
        data: items,
        total_count,
    }
}

#[tokio::test]
async fn refresh_builds_map_from_listing() {
    let api = Arc::new(FakeManagementApi::new().with_collection(
        "identities",
        vec![
            fixtures::identity("id1", "alice", &[]),
            fixtures::identity("id2", "bob", &[]),
        ],
    ));
    let resolver = NamedAttributeResolver::new(api.clone()).with_page_size(250);

    let map = resolver.refresh(RoleCategory::Identities).await.unwrap();

    assert_eq!(map, NamedAttributeMap::from([("alice", "id1"), ("bob", "id2")]));
    assert_eq!(resolver.map(RoleCategory::Identities), map);
    assert!(resolver.map(RoleCategory::EdgeRouters).is_empty());
    assert_eq!(api.list_queries("identities")[0].limit, Some(250));
}

#[tokio::test]
async fn refresh_pages_past_first_listing() {
    let api = Arc::new(
        FakeManagementApi::new().with_collection("edge-routers", fixtures::numbered("er", 150)),
    );
    let resolver = NamedAttributeResolver::new(api.clone()).with_page_size(100);

    let map = resolver.refresh(RoleCategory::EdgeRouters).await.unwrap();

    assert_eq!(map.len(), 150);
    assert_eq!(map.id_of("er-149"), Some("er-id-149"));
    let offsets: Vec<_> = api
        .list_queries("edge-routers")
        .into_iter()
        .map(|query| query.offset)
        .collect();
    assert_eq!(offsets, vec![0, 100]);
    assert_eq!(resolver.generation(RoleCategory::EdgeRouters), 1);
}

#[tokio::test]
async fn stale_response_is_discarded() {
    let api = Arc::new(FakeManagementApi::new());
    let gate = api.gate_list(
        "edge-routers",
        Ok(page(vec![json!({"id": "er-old", "name": "router-a"})])),
    );
    api.script_list(
        "edge-routers",
        Ok(page(vec![json!({"id": "er-new", "name": "router-b"})])),
    );
    let resolver = NamedAttributeResolver::new(api.clone());

    let (first, second) = tokio::join!(resolver.refresh(RoleCategory::EdgeRouters), async {
        let result = resolver.refresh(RoleCategory::EdgeRouters).await;
        gate.release();
        result
    });

    let expected = NamedAttributeMap::from([("router-b", "er-new")]);
    assert_eq!(second.unwrap(), expected);
    assert_eq!(first.unwrap(), expected);
    assert_eq!(resolver.map(RoleCategory::EdgeRouters), expected);
    assert_eq!(resolver.generation(RoleCategory::EdgeRouters), 2);
}

#[tokio::test]
async fn categories_refresh_independently() {
    let api = Arc::new(
        FakeManagementApi::new()
            .with_collection("edge-routers", vec![fixtures::edge_router("er1", "router-a", &[])])
            .with_collection("services", vec![fixtures::service("svc1", "web", &[])]),
    );
    api.script_list("identities", Err(ApiError::with_status(500, "boom")));
    let resolver = NamedAttributeResolver::new(api.clone());

    let result = resolver.refresh_all(&RoleCategory::ALL).await;

    assert!(matches!(result, Err(ConsoleError::Api(_))));
    assert_eq!(resolver.map(RoleCategory::EdgeRouters).id_of("router-a"), Some("er1"));
    assert_eq!(resolver.map(RoleCategory::Services).id_of("web"), Some("svc1"));
    assert_eq!(resolver.generation(RoleCategory::Identities), 0);
}

#[tokio::test]
async fn role_attribute_catalog() {
    let api = Arc::new(
        FakeManagementApi::new()
            .with_collection("service-role-attributes", vec![json!("public"), json!("internal")]),
    );
    let resolver = NamedAttributeResolver::new(api.clone());

    let attributes = resolver.role_attributes(RoleCategory::Services).await.unwrap();

    assert_eq!(attributes, vec!["public", "internal"]);
    assert!(api.list_queries("service-role-attributes")[0].sort_by.is_none());
}

#[tokio::test]
async fn empty_selection_makes_no_request() {
    let api = Arc::new(FakeManagementApi::new());
    let fetcher = AssociatedEntityFetcher::new(api.clone());

    let preview = fetcher
        .fetch_associated(
            RoleCategory::Identities,
            &RoleSelection::default(),
            &NamedAttributeMap::new(),
            Semantic::AllOf,
        )
        .await
        .unwrap();

    assert!(preview.items.is_empty());
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn only_stale_refs_make_no_request() {
    let api = Arc::new(FakeManagementApi::new());
    let fetcher = AssociatedEntityFetcher::new(api.clone());

    let preview = fetcher
        .fetch_associated(
            RoleCategory::EdgeRouters,
            &RoleSelection::new(Vec::<String>::new(), ["gone"]),
            &NamedAttributeMap::from([("router-a", "er1")]),
            Semantic::AnyOf,
        )
        .await
        .unwrap();

    assert_eq!(preview.total, 0);
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn all_of_preview_filter_and_rows() {
    let api = Arc::new(FakeManagementApi::new().with_collection(
        "identities",
        vec![fixtures::identity("id1", "alice", &["users", "admins"])],
    ));
    let fetcher = AssociatedEntityFetcher::new(api.clone());

    let preview = fetcher
        .fetch_associated(
            RoleCategory::Identities,
            &RoleSelection::new(["users", "admins"], Vec::<String>::new()),
            &NamedAttributeMap::new(),
            Semantic::AllOf,
        )
        .await
        .unwrap();

    assert_eq!(preview.items.len(), 1);
    assert_eq!(preview.items[0].href, "/identities/id1");
    assert!(!preview.is_truncated());
    assert!(preview.handoff.is_none());
    let query = &api.list_queries("identities")[0];
    assert_eq!(query.limit, Some(5));
    assert_eq!(
        query.filter.as_deref(),
        Some(r#"roleAttributes contains "admins" and roleAttributes contains "users""#)
    );
}

#[tokio::test]
async fn service_policies_truncate_with_handoff() {
    let api = Arc::new(FakeManagementApi::new().with_related(
        "services",
        "svc1",
        "service-policies",
        fixtures::numbered("dial", 8),
    ));
    let fetcher = AssociatedEntityFetcher::new(api.clone());
    let service = Service {
        id: Some("svc1".into()),
        name: "web".into(),
        role_attributes: vec!["public".into()],
        ..Service::default()
    };

    let preview = fetcher.service_policies(&service).await.unwrap();

    assert_eq!(preview.total, 8);
    assert_eq!(preview.items.len(), 6);
    let more = preview.items.last().unwrap();
    assert!(more.more);
    assert_eq!(more.name, MORE_RESULTS);
    assert_eq!(more.href, "/service-policies?serviceRoles=%23public,%40svc1");
    let handoff = preview.handoff.unwrap();
    assert_eq!(handoff.label, "@web");
    assert_eq!(
        handoff.value,
        FilterValue::Attributes(vec!["%23public".into(), "%40svc1".into()])
    );
}

#[tokio::test]
async fn more_results_href_escapes_attribute_values() {
    let api = Arc::new(FakeManagementApi::new().with_related(
        "services",
        "svc1",
        "service-policies",
        fixtures::numbered("dial", 8),
    ));
    let fetcher = AssociatedEntityFetcher::new(api.clone());
    let service = Service {
        id: Some("svc1".into()),
        name: "web".into(),
        role_attributes: vec!["eu west&dmz".into(), "a,b".into()],
        ..Service::default()
    };

    let preview = fetcher.service_policies(&service).await.unwrap();

    let more = preview.items.last().unwrap();
    assert_eq!(
        more.href,
        "/service-policies?serviceRoles=%23eu+west%26dmz,%23a%2Cb,%40svc1"
    );
    assert_eq!(
        preview.handoff.unwrap().value,
        FilterValue::Attributes(vec![
            "%23eu+west%26dmz".into(),
            "%23a%2Cb".into(),
            "%40svc1".into()
        ])
    );
}

#[tokio::test]
async fn terminators_truncate_to_service_filter() {
    let terminators = (0..6)
        .map(|n| fixtures::terminator(&format!("t{n}"), "edge", &format!("tcp:host:{n}"), "router-a"))
        .collect();
    let api = Arc::new(FakeManagementApi::new().with_related(
        "services",
        "svc1",
        "terminators",
        terminators,
    ));
    let fetcher = AssociatedEntityFetcher::new(api.clone()).with_limit(5);
    let service = Service {
        id: Some("svc1".into()),
        name: "web".into(),
        ..Service::default()
    };

    let preview = fetcher.terminators(&service).await.unwrap();

    assert_eq!(preview.entities().count(), 5);
    assert_eq!(preview.items[0].name, "edge:tcp:host:0");
    assert_eq!(preview.items.last().unwrap().href, "/terminators?service=svc1");
    let handoff = preview.handoff.unwrap();
    assert_eq!(handoff.filter_type, "TEXTINPUT");
    assert_eq!(handoff.verb.as_deref(), Some("="));
    assert_eq!(handoff.value, FilterValue::Text("svc1".into()));
}

#[tokio::test]
async fn unsaved_service_has_no_sub_resources() {
    let api = Arc::new(FakeManagementApi::new());
    let fetcher = AssociatedEntityFetcher::new(api.clone());
    let service = Service::default();
    assert!(fetcher.configs(&service).await.unwrap().items.is_empty());
    assert!(fetcher.terminators(&service).await.unwrap().items.is_empty());
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn dyn_api_is_object_safe() {
    let api: Arc<dyn ManagementApi> = Arc::new(FakeManagementApi::new());
    let resolver = NamedAttributeResolver::new(api);
    assert!(resolver.refresh(RoleCategory::Services).await.unwrap().is_empty());
}
