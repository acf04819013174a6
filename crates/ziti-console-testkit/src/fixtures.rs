//! JSON shaped like the controller's entities.

use serde_json::{Value, json};

/// An edge router with role attributes.
#[must_use]
pub fn edge_router(id: &str, name: &str, role_attributes: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "roleAttributes": role_attributes,
        "isOnline": true,
        "isVerified": true,
        "_links": {}
    })
}

/// An identity with role attributes.
#[must_use]
pub fn identity(id: &str, name: &str, role_attributes: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "roleAttributes": role_attributes,
        "type": {"id": "Default", "name": "Default"}
    })
}

/// A service with role attributes.
#[must_use]
pub fn service(id: &str, name: &str, role_attributes: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "roleAttributes": role_attributes,
        "configs": [],
        "encryptionRequired": true,
        "terminatorStrategy": "smartrouting"
    })
}

/// An edge router policy.
#[must_use]
pub fn edge_router_policy(
    id: &str,
    name: &str,
    edge_router_roles: &[&str],
    identity_roles: &[&str],
    semantic: &str,
) -> Value {
    json!({
        "id": id,
        "name": name,
        "edgeRouterRoles": edge_router_roles,
        "identityRoles": identity_roles,
        "semantic": semantic,
        "isSystem": false
    })
}

/// A terminator bound to a router.
#[must_use]
pub fn terminator(id: &str, binding: &str, address: &str, router_name: &str) -> Value {
    json!({
        "id": id,
        "binding": binding,
        "address": address,
        "router": {"id": format!("{router_name}-id"), "name": router_name}
    })
}

/// Entities named `{prefix}-{n}` for `n` in `0..count`.
#[must_use]
pub fn numbered(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|n| json!({"id": format!("{prefix}-id-{n}"), "name": format!("{prefix}-{n}")}))
        .collect()
}
