//! `ziti` CLI and cURL equivalents of a policy form's pending save.
//!
//! Render from an entity whose role fields are already encoded, such as
//! [`FormController::encoded_entity`](crate::form::FormController::encoded_entity).

use crate::error::ConsoleResult;
use crate::models::{EdgeRouterPolicy, FormEntity, ServiceEdgeRouterPolicy};

/// Policies that have a `ziti edge` subcommand.
pub trait PolicyCommand: FormEntity {
    /// Entity type argument of `ziti edge create|update`.
    const CLI_TYPE: &'static str;
}

impl PolicyCommand for EdgeRouterPolicy {
    const CLI_TYPE: &'static str = "edge-router-policy";
}

impl PolicyCommand for ServiceEdgeRouterPolicy {
    const CLI_TYPE: &'static str = "service-edge-router-policy";
}

fn single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// `edgeRouterRoles` -> `edge-router-roles`.
fn flag_name(key: &str) -> String {
    let mut flag = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            flag.push('-');
            flag.push(ch.to_ascii_lowercase());
        } else {
            flag.push(ch);
        }
    }
    flag
}

/// Render the `ziti edge` command that performs the same save.
#[must_use]
pub fn cli_command<E: PolicyCommand>(entity: &E) -> String {
    let mut parts = vec!["ziti".to_string(), "edge".to_string()];
    match entity.id() {
        Some(id) => {
            parts.push("update".into());
            parts.push(E::CLI_TYPE.into());
            parts.push(single_quoted(id));
            parts.push("--name".into());
            parts.push(single_quoted(entity.name()));
        }
        None => {
            parts.push("create".into());
            parts.push(E::CLI_TYPE.into());
            parts.push(single_quoted(entity.name()));
            parts.push("--semantic".into());
            parts.push(single_quoted(entity.semantic().as_str()));
        }
    }
    for field in E::role_fields() {
        parts.push(format!("--{}", flag_name(field.key)));
        parts.push(single_quoted(&entity.roles(field.key).join(",")));
    }
    parts.join(" ")
}

/// Render the cURL request that performs the same save.
///
/// # Errors
/// Returns `ConsoleError::Json` if the body cannot be serialized.
pub fn curl_command<E: PolicyCommand>(
    entity: &E,
    management_url: &str,
    session_token: Option<&str>,
) -> ConsoleResult<String> {
    let mut url = format!("{}/{}", management_url.trim_end_matches('/'), E::RESOURCE);
    if let Some(id) = entity.id() {
        url.push('/');
        url.push_str(id);
    }

    let mut fields = vec![format!("\"name\":{}", serde_json::to_string(entity.name())?)];
    for field in E::role_fields() {
        fields.push(format!(
            "{}:{}",
            serde_json::to_string(field.key)?,
            serde_json::to_string(entity.roles(field.key))?
        ));
    }
    fields.push(format!(
        "\"semantic\":{}",
        serde_json::to_string(entity.semantic().as_str())?
    ));
    let body = format!("{{{}}}", fields.join(","));

    let mut lines = vec![format!("curl {} \\", single_quoted(&url))];
    if entity.id().is_some() {
        lines.push("  --request PATCH \\".into());
    }
    lines.push("  -H 'accept: application/json' \\".into());
    lines.push("  -H 'content-type: application/json' \\".into());
    lines.push(format!(
        "  -H {} \\",
        single_quoted(&format!("zt-session: {}", session_token.unwrap_or_default()))
    ));
    lines.push(format!("  --data-raw {}", single_quoted(&body)));
    Ok(lines.join("\n"))
}
