//! Form controller lifecycle against the in-memory management API.

use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use ziti_console_core::api::{ManagementApi, WriteAck};
use ziti_console_core::error::{ApiError, ConsoleError};
use ziti_console_core::form::{
    CONFIGS, FormController, FormExtension, FormState, SaveDirective, SavedRecord, TERMINATORS,
};
use ziti_console_core::models::{EdgeRouterPolicy, Semantic, Service};
use ziti_console_core::notify::Level;
use ziti_console_core::roles::RoleSelection;
use ziti_console_testkit::{ApiCall, FakeManagementApi, RecordingNotifier, fixtures};

fn seeded_api() -> Arc<FakeManagementApi> {
    Arc::new(
        FakeManagementApi::new()
            .with_collection(
                "edge-routers",
                vec![
                    fixtures::edge_router("er1", "router-a", &["east"]),
                    fixtures::edge_router("er2", "router-b", &["west"]),
                ],
            )
            .with_collection(
                "identities",
                vec![fixtures::identity("id1", "alice", &["users"])],
            )
            .with_collection(
                "edge-router-policies",
                vec![fixtures::edge_router_policy(
                    "erp1",
                    "east-policy",
                    &["#east", "@er1"],
                    &["@id1"],
                    "AnyOf",
                )],
            ),
    )
}

fn policy_form(
    api: &Arc<FakeManagementApi>,
) -> (FormController<EdgeRouterPolicy>, Arc<RecordingNotifier>) {
    ziti_console_testkit::init_tracing();
    let notifier = Arc::new(RecordingNotifier::new());
    let dyn_api: Arc<dyn ManagementApi> = api.clone();
    (FormController::new(dyn_api, notifier.clone()), notifier)
}

struct CloseAfterSave;

#[async_trait]
impl FormExtension<EdgeRouterPolicy> for CloseAfterSave {
    async fn form_data_saved(&self, _entity: &EdgeRouterPolicy) -> SaveDirective {
        SaveDirective::Close
    }
}

struct RejectAll;

#[async_trait]
impl FormExtension<EdgeRouterPolicy> for RejectAll {
    async fn validate(&self, _entity: &EdgeRouterPolicy) -> bool {
        false
    }
}

#[tokio::test]
async fn load_decodes_stored_roles() {
    ziti_console_testkit::init_tracing();
    let api = seeded_api();
    let (mut form, _) = policy_form(&api);
    assert_eq!(form.state(), FormState::Loading);

    form.load(Some("erp1")).await.unwrap();

    assert_eq!(form.state(), FormState::Ready);
    assert!(form.is_editing());
    assert!(!form.is_dirty());
    assert_eq!(
        form.selection("edgeRouterRoles"),
        Some(&RoleSelection::new(["east"], ["router-a"]))
    );
    assert_eq!(
        form.selection("identityRoles"),
        Some(&RoleSelection::new(Vec::<String>::new(), ["alice"]))
    );
    assert!(form.preview("edgeRouterRoles").unwrap().loading);
    assert!(form.preview("identityRoles").unwrap().loading);
}

#[tokio::test]
async fn load_missing_entity_is_not_found() {
    let api = seeded_api();
    let (mut form, _) = policy_form(&api);
    let err = form.load(Some("nope")).await.unwrap_err();
    assert!(matches!(err, ConsoleError::NotFound { ref id, .. } if id == "nope"));
    assert_eq!(form.state(), FormState::Loading);
}

#[tokio::test]
async fn failed_name_refresh_keeps_form_unsavable() {
    let api = seeded_api();
    let (mut form, _) = policy_form(&api);
    api.script_list("edge-routers", Err(ApiError::with_status(503, "unavailable")));

    let err = form.load(Some("erp1")).await.unwrap_err();

    assert!(matches!(err, ConsoleError::Api(ref api_err) if api_err.status == Some(503)));
    assert_eq!(form.state(), FormState::Loading);
    let err = form.save().await.unwrap_err();
    assert!(matches!(err, ConsoleError::InvalidState { .. }));
    assert!(api.writes().is_empty());
}

#[tokio::test]
async fn save_before_load_is_invalid_state() {
    let api = seeded_api();
    let (mut form, _) = policy_form(&api);
    let err = form.save().await.unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::InvalidState {
            expected: "ready",
            actual: "loading"
        }
    ));
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn blank_name_fails_validation_without_requests() {
    let api = seeded_api();
    let (mut form, notifier) = policy_form(&api);
    form.load(None).await.unwrap();
    form.entity_mut().name = "   ".into();
    let calls_before = api.call_count();

    let err = form.save().await.unwrap_err();

    let ConsoleError::Validation(errors) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert!(errors.contains("name"));
    assert!(form.errors().contains("name"));
    assert_eq!(api.call_count(), calls_before);
    assert_eq!(form.state(), FormState::Ready);
    assert_eq!(notifier.subtitles(Level::Error), vec!["Data Invalid"]);
}

#[tokio::test]
async fn extension_validation_blocks_save() {
    let api = seeded_api();
    let (form, notifier) = policy_form(&api);
    let mut form = form.with_extension(Arc::new(RejectAll));
    form.load(None).await.unwrap();
    form.entity_mut().name = "valid".into();

    assert!(matches!(
        form.save().await,
        Err(ConsoleError::Validation(_))
    ));
    assert!(api.writes().is_empty());
    assert_eq!(form.state(), FormState::Ready);
    assert_eq!(notifier.len(), 1);
}

#[tokio::test]
async fn create_encodes_selections_and_adopts_id() {
    let api = seeded_api();
    let (mut form, notifier) = policy_form(&api);
    form.load(None).await.unwrap();
    form.entity_mut().name = "  new policy ".into();
    form.entity_mut().semantic = Semantic::AnyOf;
    assert!(form.set_selection(
        "edgeRouterRoles",
        RoleSelection::new(["east"], ["router-a", "ghost"])
    ));
    assert!(form.set_selection(
        "identityRoles",
        RoleSelection::new(["users"], Vec::<String>::new())
    ));

    let outcome = form.save().await.unwrap();

    let writes = api.writes();
    assert_eq!(writes.len(), 1);
    let ApiCall::Create { resource, body } = &writes[0] else {
        panic!("expected create, got {:?}", writes[0]);
    };
    assert_eq!(resource, "edge-router-policies");
    assert_eq!(
        body,
        &json!({
            "name": "new policy",
            "edgeRouterRoles": ["#east", "@er1"],
            "identityRoles": ["#users"],
            "semantic": "AnyOf"
        })
    );

    let SavedRecord::Entity(saved) = outcome.record else {
        panic!("expected saved entity");
    };
    assert_eq!(outcome.directive, SaveDirective::Stay);
    assert!(saved.id.is_some());
    assert_eq!(form.state(), FormState::Ready);
    assert_eq!(form.baseline(), &saved);
    assert_eq!(
        form.selection("edgeRouterRoles"),
        Some(&RoleSelection::new(["east"], ["router-a"]))
    );
    assert_eq!(
        notifier.subtitles(Level::Success),
        vec!["Edge Router Policy Created"]
    );
}

#[tokio::test]
async fn ack_without_id_keeps_submitted_baseline() {
    let api = seeded_api();
    api.script_write("edge-router-policies", Ok(WriteAck::default()));
    let (mut form, _) = policy_form(&api);
    form.load(None).await.unwrap();
    form.entity_mut().name = "quiet".into();
    form.set_selection("edgeRouterRoles", RoleSelection::new(["east"], Vec::<String>::new()));

    let outcome = form.save().await.unwrap();

    assert_eq!(outcome.record, SavedRecord::Acknowledged);
    assert_eq!(form.state(), FormState::Ready);
    assert_eq!(form.baseline().name, "quiet");
    assert_eq!(form.baseline().edge_router_roles, vec!["#east"]);
    assert!(form.baseline().id.is_none());
}

#[tokio::test]
async fn update_patches_existing_entity() {
    let api = seeded_api();
    let (mut form, notifier) = policy_form(&api);
    form.load(Some("erp1")).await.unwrap();
    form.entity_mut().name = "renamed".into();
    assert!(form.is_dirty());

    form.save().await.unwrap();

    assert!(matches!(
        &api.writes()[0],
        ApiCall::Update { id, .. } if id == "erp1"
    ));
    assert_eq!(form.baseline().name, "renamed");
    assert!(!form.is_dirty());
    assert_eq!(
        notifier.subtitles(Level::Success),
        vec!["Edge Router Policy Updated"]
    );
}

#[tokio::test]
async fn rejected_save_returns_to_ready_unchanged() {
    let api = seeded_api();
    api.script_write(
        "edge-router-policies",
        Err(ApiError {
            status: Some(400),
            code: Some("COULD_NOT_VALIDATE".into()),
            message: "name is not unique".into(),
            field: Some("name".into()),
        }),
    );
    let (mut form, notifier) = policy_form(&api);
    form.load(None).await.unwrap();
    form.entity_mut().name = "dup".into();
    form.set_selection("edgeRouterRoles", RoleSelection::new(["east"], Vec::<String>::new()));

    let err = form.save().await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Error Creating Edge Router Policy: name is not unique"
    );
    assert_eq!(form.state(), FormState::Ready);
    assert!(form.entity().edge_router_roles.is_empty());
    assert!(form.entity().id.is_none());
    let last = notifier.last().unwrap();
    assert_eq!(last.level, Level::Error);
    assert_eq!(last.subtitle, "Error Creating Edge Router Policy");
    assert_eq!(last.message, "name is not unique");
}

#[tokio::test]
async fn close_directive_closes_form() {
    let api = seeded_api();
    let (form, _) = policy_form(&api);
    let mut form = form.with_extension(Arc::new(CloseAfterSave));
    form.load(Some("erp1")).await.unwrap();

    let outcome = form.save().await.unwrap();

    assert_eq!(outcome.directive, SaveDirective::Close);
    assert_eq!(form.state(), FormState::Closed);
    assert!(matches!(
        form.save().await,
        Err(ConsoleError::InvalidState { actual: "closed", .. })
    ));
}

#[tokio::test]
async fn previews_follow_selection_and_truncate() {
    let api = Arc::new(
        FakeManagementApi::new()
            .with_collection("edge-routers", fixtures::numbered("router", 7))
            .with_collection("identities", Vec::new()),
    );
    let (mut form, _) = policy_form(&api);
    form.load(None).await.unwrap();
    form.entity_mut().semantic = Semantic::AnyOf;
    form.set_selection("edgeRouterRoles", RoleSelection::new(["east"], ["router-1"]));

    form.refresh_previews().await;

    let slot = form.preview("edgeRouterRoles").unwrap();
    assert!(!slot.loading);
    assert!(slot.error.is_none());
    assert_eq!(slot.preview.total, 7);
    assert_eq!(slot.preview.entities().count(), 5);
    assert!(slot.preview.is_truncated());

    let filters: Vec<Option<String>> = api
        .list_queries("edge-routers")
        .into_iter()
        .map(|query| query.filter)
        .collect();
    assert!(filters.contains(&Some(
        r#"(anyOf(roleAttributes) in ["east"]) or id in ["router-id-1"]"#.to_string()
    )));

    let identities = form.preview("identityRoles").unwrap();
    assert!(!identities.loading);
    assert!(identities.preview.items.is_empty());

    let handoff = form.handoff().unwrap();
    assert_eq!(handoff.column_id, "roleAttributes");
    assert_eq!(handoff.filter_name, "Edge Router Attributes");
}

#[tokio::test]
async fn preview_failure_is_recorded_on_slot() {
    let api = seeded_api();
    let (mut form, _) = policy_form(&api);
    form.load(Some("erp1")).await.unwrap();
    api.script_list("edge-routers", Err(ApiError::with_status(503, "unavailable")));

    form.refresh_previews().await;

    let slot = form.preview("edgeRouterRoles").unwrap();
    assert!(!slot.loading);
    assert!(slot.error.as_deref().unwrap().contains("unavailable"));
    assert_eq!(form.state(), FormState::Ready);
}

fn service_api() -> Arc<FakeManagementApi> {
    Arc::new(
        FakeManagementApi::new()
            .with_collection("services", vec![fixtures::service("svc1", "web", &["public"])])
            .with_related(
                "services",
                "svc1",
                "terminators",
                vec![fixtures::terminator("t1", "edge", "tcp:localhost:8080", "router-a")],
            )
            .with_related(
                "services",
                "svc1",
                "configs",
                fixtures::numbered("cfg", 7),
            ),
    )
}

#[tokio::test]
async fn service_save_rereads_entity() {
    let api = service_api();
    let notifier = Arc::new(RecordingNotifier::new());
    let dyn_api: Arc<dyn ManagementApi> = api.clone();
    let mut form: FormController<Service> = FormController::new(dyn_api, notifier);
    form.load(Some("svc1")).await.unwrap();
    form.entity_mut().name = "web-2".into();

    form.save().await.unwrap();

    let calls = api.calls();
    let update_at = calls
        .iter()
        .position(|call| matches!(call, ApiCall::Update { .. }))
        .unwrap();
    assert!(matches!(
        &calls[update_at + 1],
        ApiCall::Get { resource, id } if resource == "services" && id == "svc1"
    ));
    assert_eq!(form.baseline().name, "web-2");
}

#[tokio::test]
async fn service_previews_cover_sub_resources() {
    let api = service_api();
    let notifier = Arc::new(RecordingNotifier::new());
    let dyn_api: Arc<dyn ManagementApi> = api.clone();
    let mut form: FormController<Service> = FormController::new(dyn_api, notifier);
    form.load(Some("svc1")).await.unwrap();

    form.refresh_service_previews().await;

    let terminators = &form.preview(TERMINATORS).unwrap().preview;
    assert_eq!(terminators.items.len(), 1);
    assert_eq!(terminators.items[0].name, "edge:tcp:localhost:8080");
    assert_eq!(terminators.items[0].href, "/terminators/t1");

    let configs = &form.preview(CONFIGS).unwrap().preview;
    assert_eq!(configs.items.len(), 7);
    assert!(!configs.is_truncated());
}
