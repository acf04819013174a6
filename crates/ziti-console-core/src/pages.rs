//! List-page row logic: edge router actions and re-enrollment, JWT signer
//! delete guard, and API session labels.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::api::{ListQuery, ManagementApi};
use crate::error::ConsoleResult;
use crate::models::EntityRef;
use crate::notify::{Notification, Notifier};

/// Router build details reported by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionInfo {
    /// Operating system, e.g. `linux`.
    pub os: String,
    /// OS version string.
    pub os_version: Option<String>,
    /// CPU architecture.
    pub arch: String,
    /// Router version.
    pub version: String,
    /// Source revision.
    pub revision: String,
}

/// An edge router as listed by the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeRouter {
    /// Router id.
    pub id: String,
    /// Router name.
    pub name: String,
    /// Role attributes.
    pub role_attributes: Vec<String>,
    /// Connected to the controller.
    pub is_online: bool,
    /// Enrollment completed.
    pub is_verified: bool,
    /// Pending enrollment token.
    pub enrollment_token: Option<String>,
    /// Pending enrollment JWT.
    pub enrollment_jwt: Option<String>,
    /// Expiry of the pending enrollment.
    pub enrollment_expires_at: Option<DateTime<Utc>>,
    /// Build details, once the router has connected.
    pub version_info: Option<VersionInfo>,
}

/// Per-row action in the edge router list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowAction {
    /// Open the edit form.
    Update,
    /// Issue a new enrollment.
    ReEnroll,
    /// Delete the router.
    Delete,
    /// Download the pending enrollment JWT.
    DownloadEnrollment,
}

impl RowAction {
    /// Action id.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::ReEnroll => "re-enroll",
            Self::Delete => "delete",
            Self::DownloadEnrollment => "download-enrollment",
        }
    }
}

impl fmt::Display for RowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions offered for an edge router row.
#[must_use]
pub fn row_actions(router: &EdgeRouter) -> Vec<RowAction> {
    let mut actions = vec![RowAction::Update, RowAction::ReEnroll, RowAction::Delete];
    if router
        .enrollment_jwt
        .as_deref()
        .is_some_and(|jwt| !jwt.is_empty())
    {
        actions.push(RowAction::DownloadEnrollment);
    }
    actions
}

/// Text for the enrollment token column at `now`.
#[must_use]
pub fn enrollment_display(router: &EdgeRouter, now: DateTime<Utc>) -> String {
    match router.enrollment_token.as_deref() {
        Some(token) if !token.is_empty() => match router.enrollment_expires_at {
            Some(expires) if expires < now => "Enrollment Expired".to_string(),
            _ => token.to_string(),
        },
        _ => String::new(),
    }
}

/// Operating system family used for row icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// macOS / darwin.
    Apple,
    /// Windows.
    Windows,
    /// Linux.
    Linux,
    /// Android.
    Android,
    /// Anything else or unknown.
    Other,
}

impl OsFamily {
    /// Icon class name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Apple => "apple",
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Android => "android",
            Self::Other => "other",
        }
    }

    /// Classify from `os` and `osVersion`; later table entries win.
    #[must_use]
    pub fn classify(info: Option<&VersionInfo>) -> Self {
        const TABLE: [(&str, OsFamily); 4] = [
            ("darwin", OsFamily::Apple),
            ("linux", OsFamily::Linux),
            ("android", OsFamily::Android),
            ("windows", OsFamily::Windows),
        ];
        let Some(info) = info else {
            return Self::Other;
        };
        let os = info.os.to_lowercase();
        let os_version = info.os_version.as_deref().unwrap_or_default().to_lowercase();
        TABLE
            .iter()
            .filter(|(key, _)| os.contains(key) || os_version.contains(key))
            .map(|(_, family)| *family)
            .last()
            .unwrap_or(Self::Other)
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display fields of one edge router row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRouterRow {
    /// The router.
    #[serde(flatten)]
    pub router: EdgeRouter,
    /// Offered actions.
    pub actions: Vec<RowAction>,
    /// OS family.
    pub os: OsFamily,
    /// Enrollment token column text.
    pub token: String,
}

impl EdgeRouterRow {
    /// Derive the display fields of a router at `now`.
    #[must_use]
    pub fn new(router: EdgeRouter, now: DateTime<Utc>) -> Self {
        Self {
            actions: row_actions(&router),
            os: OsFamily::classify(router.version_info.as_ref()),
            token: enrollment_display(&router, now),
            router,
        }
    }
}

/// List one page of edge routers with their row fields.
///
/// # Errors
/// Returns `ConsoleError::Api` if the listing fails.
#[instrument(skip(api, query))]
pub async fn list_edge_routers(
    api: &dyn ManagementApi,
    query: &ListQuery,
    now: DateTime<Utc>,
) -> ConsoleResult<(Vec<EdgeRouterRow>, u64)> {
    let page = api.list("edge-routers", query).await?;
    let routers: Vec<EdgeRouter> = page.items()?;
    let rows = routers
        .into_iter()
        .map(|router| EdgeRouterRow::new(router, now))
        .collect();
    Ok((rows, page.total_count))
}

/// Issue a new enrollment for an edge router.
///
/// A connected router stays disconnected until it enrolls with the new JWT.
///
/// # Errors
/// Returns `ConsoleError::Api` if the controller rejects the request.
#[instrument(skip(api, notifier))]
pub async fn re_enroll_edge_router(
    api: &dyn ManagementApi,
    notifier: &dyn Notifier,
    id: &str,
) -> ConsoleResult<()> {
    api.action("edge-routers", id, RowAction::ReEnroll.as_str(), &json!({}))
        .await?;
    info!(id, "edge router re-enroll sent");
    notifier.notify(Notification::success(
        "Success",
        "Re-enroll Confirmed",
        "Router re-enroll was sent. A new enrollment token is now available",
    ));
    Ok(())
}

/// External JWT signer.
pub type JwtSigner = EntityRef;

/// Primary authentication settings of an auth policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrimaryAuth {
    /// External JWT settings.
    pub ext_jwt: Option<ExtJwtAuth>,
}

/// External JWT primary authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtJwtAuth {
    /// Signer ids accepted.
    pub allowed_signers: Vec<String>,
}

/// Secondary authentication settings of an auth policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecondaryAuth {
    /// Signer id required as a second factor.
    pub require_ext_jwt_signer: Option<String>,
}

/// Auth policy, reduced to its JWT signer references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthPolicy {
    /// Policy id.
    pub id: String,
    /// Policy name.
    pub name: String,
    /// Primary authentication.
    pub primary: PrimaryAuth,
    /// Secondary authentication.
    pub secondary: SecondaryAuth,
}

impl AuthPolicy {
    /// Whether the policy references a signer.
    #[must_use]
    pub fn references_signer(&self, signer_id: &str) -> bool {
        let allowed = self
            .primary
            .ext_jwt
            .as_ref()
            .is_some_and(|jwt| jwt.allowed_signers.iter().any(|id| id == signer_id));
        allowed || self.secondary.require_ext_jwt_signer.as_deref() == Some(signer_id)
    }
}

/// Outcome of a JWT signer delete check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SignerDeleteCheck {
    /// No auth policy references the selection.
    Allowed {
        /// Bulk delete confirmation label.
        label: String,
    },
    /// Some signers are still referenced and cannot be deleted.
    Blocked {
        /// Dialog title.
        title: String,
        /// Dialog message.
        message: String,
        /// Dialog hint.
        submessage: String,
        /// Names of the referenced signers.
        names: Vec<String>,
    },
}

/// Decide whether the selected signers can be deleted.
#[must_use]
pub fn check_signer_delete(selected: &[JwtSigner], policies: &[AuthPolicy]) -> SignerDeleteCheck {
    let mut seen = BTreeSet::new();
    let in_use: Vec<&JwtSigner> = selected
        .iter()
        .filter(|signer| policies.iter().any(|policy| policy.references_signer(&signer.id)))
        .filter(|signer| seen.insert(signer.id.as_str()))
        .collect();

    if in_use.is_empty() {
        let label = if selected.len() > 1 {
            "external JWT signers"
        } else {
            "external JWT signer"
        };
        return SignerDeleteCheck::Allowed {
            label: label.to_string(),
        };
    }

    let plural = in_use.len() > 1;
    SignerDeleteCheck::Blocked {
        title: if plural { "JWT Signers In Use" } else { "JWT Signer In Use" }.to_string(),
        message: if plural {
            "The following external JWT signers are still in use by an auth policy and can not be deleted:"
        } else {
            "The following external JWT signer is still in use by an auth policy and can not be deleted:"
        }
        .to_string(),
        submessage: if plural {
            "To delete these external JWT signers, first remove them from any associated auth policies."
        } else {
            "To delete this external JWT signer, first remove it from any associated auth policies."
        }
        .to_string(),
        names: in_use.iter().map(|signer| signer.name.clone()).collect(),
    }
}

/// Fetch auth policies and check the selected signers against them.
///
/// # Errors
/// Returns `ConsoleError::Api` if a listing fails.
#[instrument(skip(api))]
pub async fn check_jwt_signer_delete(
    api: &dyn ManagementApi,
    signer_ids: &[String],
    page_size: u32,
) -> ConsoleResult<SignerDeleteCheck> {
    let query = ListQuery::with_limit(page_size);
    let signers: Vec<JwtSigner> = api.list("external-jwt-signers", &query).await?.items()?;
    let policies: Vec<AuthPolicy> = api.list("auth-policies", &query).await?.items()?;
    let selected: Vec<JwtSigner> = signers
        .into_iter()
        .filter(|signer| signer_ids.contains(&signer.id))
        .collect();
    Ok(check_signer_delete(&selected, &policies))
}

/// API session, as far as its delete label needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSession {
    /// Session id.
    pub id: String,
    /// Service the session is bound to, when reported.
    pub service: Option<EntityRef>,
}

/// Bulk delete label `<service name>: <id>`, or the bare id without a service.
#[must_use]
pub fn api_session_label(session: &ApiSession) -> String {
    session.service.as_ref().map_or_else(
        || session.id.clone(),
        |service| format!("{}: {}", service.name, session.id),
    )
}
