//! Entity models edited by the console forms.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConsoleResult;

/// Entity kinds that can be referenced from a policy by `#role` or `@id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleCategory {
    /// Edge routers.
    EdgeRouters,
    /// Identities.
    Identities,
    /// Services.
    Services,
}

impl RoleCategory {
    /// All categories.
    pub const ALL: [Self; 3] = [Self::EdgeRouters, Self::Identities, Self::Services];

    /// Collection listing the referenceable entities.
    #[must_use]
    pub const fn entity_resource(self) -> &'static str {
        match self {
            Self::EdgeRouters => "edge-routers",
            Self::Identities => "identities",
            Self::Services => "services",
        }
    }

    /// Singular display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::EdgeRouters => "Edge Router",
            Self::Identities => "Identity",
            Self::Services => "Service",
        }
    }

    /// Collection listing the role attributes in use.
    #[must_use]
    pub const fn role_attribute_resource(self) -> &'static str {
        match self {
            Self::EdgeRouters => "edge-router-role-attributes",
            Self::Identities => "identity-role-attributes",
            Self::Services => "service-role-attributes",
        }
    }
}

impl fmt::Display for RoleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_resource())
    }
}

/// Policy matching mode over role attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Semantic {
    /// Entity matches if it carries any listed attribute.
    AnyOf,
    /// Entity matches only if it carries every listed attribute.
    #[default]
    AllOf,
}

impl Semantic {
    /// Label shown in list pages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AnyOf => "Any Of",
            Self::AllOf => "All Of",
        }
    }

    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AnyOf => "AnyOf",
            Self::AllOf => "AllOf",
        }
    }
}

impl fmt::Display for Semantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Semantic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AnyOf" | "anyOf" | "any-of" => Ok(Self::AnyOf),
            "AllOf" | "allOf" | "all-of" => Ok(Self::AllOf),
            other => Err(format!("unknown semantic '{other}' (expected AnyOf or AllOf)")),
        }
    }
}

/// `{ id, name }` pair returned by list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// A role-bearing field of a form entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleField {
    /// Wire field name, e.g. `edgeRouterRoles`.
    pub key: &'static str,
    /// Category the encoded roles refer to.
    pub category: RoleCategory,
}

/// An entity edited through a [`FormController`](crate::form::FormController).
pub trait FormEntity:
    Clone + Default + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Management API collection.
    const RESOURCE: &'static str;
    /// Human label used in notifications.
    const LABEL: &'static str;

    /// Persisted id; `None` while creating.
    fn id(&self) -> Option<&str>;

    /// Assign the id returned by a create.
    fn set_id(&mut self, id: String);

    /// Display name.
    fn name(&self) -> &str;

    /// Replace the display name.
    fn set_name(&mut self, name: String);

    /// Role-bearing fields and the category each one references.
    fn role_fields() -> &'static [RoleField] {
        &[]
    }

    /// Encoded roles stored under `key`.
    fn roles(&self, _key: &str) -> &[String] {
        &[]
    }

    /// Replace the encoded roles stored under `key`.
    fn set_roles(&mut self, _key: &str, _roles: Vec<String>) {}

    /// Matching mode used when previewing role selections.
    fn semantic(&self) -> Semantic {
        Semantic::default()
    }

    /// Whether the saved entity should be re-read from the controller.
    fn refetch_after_save() -> bool {
        false
    }

    /// Writable fields sent on create/update.
    ///
    /// # Errors
    /// Returns `ConsoleError::Json` if the entity cannot be serialized.
    fn payload(&self) -> ConsoleResult<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("id");
        }
        Ok(value)
    }
}

/// Edge router policy: which identities may use which edge routers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeRouterPolicy {
    /// Persisted id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Policy name.
    pub name: String,
    /// Encoded edge router roles.
    pub edge_router_roles: Vec<String>,
    /// Encoded identity roles.
    pub identity_roles: Vec<String>,
    /// Matching mode.
    pub semantic: Semantic,
    /// Opaque application data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_data: Option<Value>,
    /// Opaque tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
}

const EDGE_ROUTER_POLICY_ROLES: &[RoleField] = &[
    RoleField {
        key: "edgeRouterRoles",
        category: RoleCategory::EdgeRouters,
    },
    RoleField {
        key: "identityRoles",
        category: RoleCategory::Identities,
    },
];

impl FormEntity for EdgeRouterPolicy {
    const RESOURCE: &'static str = "edge-router-policies";
    const LABEL: &'static str = "Edge Router Policy";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn semantic(&self) -> Semantic {
        self.semantic
    }

    fn role_fields() -> &'static [RoleField] {
        EDGE_ROUTER_POLICY_ROLES
    }

    fn roles(&self, key: &str) -> &[String] {
        match key {
            "edgeRouterRoles" => &self.edge_router_roles,
            "identityRoles" => &self.identity_roles,
            _ => &[],
        }
    }

    fn set_roles(&mut self, key: &str, roles: Vec<String>) {
        match key {
            "edgeRouterRoles" => self.edge_router_roles = roles,
            "identityRoles" => self.identity_roles = roles,
            _ => {}
        }
    }
}

/// Service edge router policy: which services may be reached over which edge routers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceEdgeRouterPolicy {
    /// Persisted id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Policy name.
    pub name: String,
    /// Encoded edge router roles.
    pub edge_router_roles: Vec<String>,
    /// Encoded service roles.
    pub service_roles: Vec<String>,
    /// Matching mode.
    pub semantic: Semantic,
    /// Opaque tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
}

const SERVICE_EDGE_ROUTER_POLICY_ROLES: &[RoleField] = &[
    RoleField {
        key: "edgeRouterRoles",
        category: RoleCategory::EdgeRouters,
    },
    RoleField {
        key: "serviceRoles",
        category: RoleCategory::Services,
    },
];

impl FormEntity for ServiceEdgeRouterPolicy {
    const RESOURCE: &'static str = "service-edge-router-policies";
    const LABEL: &'static str = "Service Edge Router Policy";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn semantic(&self) -> Semantic {
        self.semantic
    }

    fn role_fields() -> &'static [RoleField] {
        SERVICE_EDGE_ROUTER_POLICY_ROLES
    }

    fn roles(&self, key: &str) -> &[String] {
        match key {
            "edgeRouterRoles" => &self.edge_router_roles,
            "serviceRoles" => &self.service_roles,
            _ => &[],
        }
    }

    fn set_roles(&mut self, key: &str, roles: Vec<String>) {
        match key {
            "edgeRouterRoles" => self.edge_router_roles = roles,
            "serviceRoles" => self.service_roles = roles,
            _ => {}
        }
    }
}

/// A service. Its role attributes are plain tags, not encoded references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    /// Persisted id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Service name.
    pub name: String,
    /// Role attributes carried by the service.
    pub role_attributes: Vec<String>,
    /// Attached config ids.
    pub configs: Vec<String>,
    /// Whether end-to-end encryption is required.
    pub encryption_required: bool,
    /// Terminator selection strategy.
    pub terminator_strategy: String,
    /// Opaque tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
}

impl Default for Service {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            role_attributes: Vec::new(),
            configs: Vec::new(),
            encryption_required: true,
            terminator_strategy: "smartrouting".into(),
            tags: None,
        }
    }
}

impl FormEntity for Service {
    const RESOURCE: &'static str = "services";
    const LABEL: &'static str = "Service";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn refetch_after_save() -> bool {
        true
    }
}
