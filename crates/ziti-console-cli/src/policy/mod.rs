//! `ziti-console edge-router-policy` commands.
//!
//! Every subcommand drives a [`FormController`] the way the console form
//! does: load (resolving named roles), apply edits, then save, preview or
//! render the equivalent `ziti`/cURL command.
//!
//! ```text
//! ziti-console edge-router-policy show erp1
//! ziti-console edge-router-policy create --name web --semantic AnyOf \
//!     --edge-router-roles '#public,@router-a' --identity-roles '#users'
//! ziti-console edge-router-policy command --format curl erp1 --name renamed
//! ```

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand, ValueEnum};
use serde_json::{Map, Value, json};
use ziti_console_core::commands::{cli_command, curl_command};
use ziti_console_core::form::{FormController, SavedRecord};
use ziti_console_core::models::{EdgeRouterPolicy, FormEntity, Semantic};
use ziti_console_core::roles::RoleSelection;

use crate::context::Context;

/// Edge router policy subcommands.
#[derive(Subcommand, Debug)]
pub enum PolicyAction {
    /// Print a policy with its decoded role selections.
    Show {
        /// Policy id.
        id: String,
    },
    /// Create a policy.
    Create(EditArgs),
    /// Update a policy.
    Update {
        /// Policy id.
        id: String,
        #[command(flatten)]
        edit: EditArgs,
    },
    /// Preview the edge routers and identities a selection matches.
    Preview {
        /// Policy id; omit to preview an unsaved selection.
        id: Option<String>,
        #[command(flatten)]
        edit: EditArgs,
    },
    /// Render the `ziti` CLI or cURL command for a pending save.
    Command {
        /// Output format.
        #[arg(long, value_enum, default_value_t = CommandFormat::Cli)]
        format: CommandFormat,
        /// Policy id; omit to render a create.
        id: Option<String>,
        #[command(flatten)]
        edit: EditArgs,
    },
}

/// Rendered command flavor.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum CommandFormat {
    /// `ziti edge create|update edge-router-policy ...`
    #[default]
    Cli,
    /// `curl ...` against the management API.
    Curl,
}

/// Field edits applied on top of the loaded policy.
#[derive(Args, Debug, Default)]
pub struct EditArgs {
    /// Policy name.
    #[arg(long)]
    pub name: Option<String>,

    /// Matching mode (`AnyOf` or `AllOf`).
    #[arg(long)]
    pub semantic: Option<Semantic>,

    /// Edge router roles as `#attribute` or `@name`, comma separated.
    #[arg(long, value_delimiter = ',', value_parser = parse_role_token, num_args = 0..)]
    pub edge_router_roles: Option<Vec<String>>,

    /// Identity roles as `#attribute` or `@name`, comma separated.
    #[arg(long, value_delimiter = ',', value_parser = parse_role_token, num_args = 0..)]
    pub identity_roles: Option<Vec<String>>,
}

impl EditArgs {
    fn apply(&self, form: &mut FormController<EdgeRouterPolicy>) {
        if let Some(name) = &self.name {
            form.entity_mut().name.clone_from(name);
        }
        if let Some(semantic) = self.semantic {
            form.entity_mut().semantic = semantic;
        }
        for (key, tokens) in [
            ("edgeRouterRoles", &self.edge_router_roles),
            ("identityRoles", &self.identity_roles),
        ] {
            if let Some(tokens) = tokens {
                form.set_selection(key, RoleSelection::from_tokens(tokens));
            }
        }
    }
}

/// Accept `#attr` or `@name`; anything else is ambiguous.
fn parse_role_token(raw: &str) -> Result<String, String> {
    let token = raw.trim();
    match token.chars().next() {
        Some('#' | '@') if token.len() > 1 => Ok(token.to_string()),
        _ => Err(format!("role '{raw}' must start with '#' (attribute) or '@' (name)")),
    }
}

/// Run an edge router policy subcommand.
pub async fn run(ctx: &Context, command: &PolicyAction) -> Result<()> {
    match command {
        PolicyAction::Show { id } => {
            let form = load(ctx, Some(id)).await?;
            print_json(&form_json(&form))
        }
        PolicyAction::Create(edit) => save(ctx, None, edit).await,
        PolicyAction::Update { id, edit } => save(ctx, Some(id), edit).await,
        PolicyAction::Preview { id, edit } => {
            let mut form = load(ctx, id.as_deref()).await?;
            edit.apply(&mut form);
            form.refresh_previews().await;
            print_json(&previews_json(&form))
        }
        PolicyAction::Command { format, id, edit } => {
            let mut form = load(ctx, id.as_deref()).await?;
            edit.apply(&mut form);
            let entity = form.encoded_entity();
            let rendered = match format {
                CommandFormat::Cli => cli_command(&entity),
                CommandFormat::Curl => curl_command(
                    &entity,
                    &ctx.config.management_url(),
                    ctx.config.session_token.as_deref(),
                )?,
            };
            println!("{rendered}");
            Ok(())
        }
    }
}

async fn load(ctx: &Context, id: Option<&str>) -> Result<FormController<EdgeRouterPolicy>> {
    let mut form = FormController::with_options(
        ctx.client.clone(),
        ctx.notifier.clone(),
        ctx.config.form_options(),
    );
    form.load(id).await.with_context(|| match id {
        Some(id) => format!("Failed to load edge router policy {id}"),
        None => "Failed to prepare edge router policy form".to_string(),
    })?;
    Ok(form)
}

async fn save(ctx: &Context, id: Option<&str>, edit: &EditArgs) -> Result<()> {
    let mut form = load(ctx, id).await?;
    edit.apply(&mut form);

    let outcome = form.save().await.context("Failed to save edge router policy")?;
    if matches!(outcome.record, SavedRecord::Acknowledged) {
        tracing::info!("controller acknowledged the save without returning an id");
    }
    print_json(&form_json(&form))
}

fn form_json(form: &FormController<EdgeRouterPolicy>) -> Value {
    let selections: Map<String, Value> = EdgeRouterPolicy::role_fields()
        .iter()
        .map(|field| {
            let selection = form.selection(field.key).cloned().unwrap_or_default();
            (field.key.to_string(), json!(selection))
        })
        .collect();
    json!({
        "policy": form.baseline(),
        "selections": selections,
    })
}

fn previews_json(form: &FormController<EdgeRouterPolicy>) -> Value {
    let previews: Map<String, Value> = EdgeRouterPolicy::role_fields()
        .iter()
        .map(|field| {
            let value = form.preview(field.key).map_or(Value::Null, |slot| {
                let mut value = json!(slot.preview);
                if let (Some(error), Value::Object(map)) = (&slot.error, &mut value) {
                    map.insert("error".into(), json!(error));
                }
                value
            });
            (field.key.to_string(), value)
        })
        .collect();
    Value::Object(previews)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_tokens_need_a_sigil() {
        assert_eq!(parse_role_token(" #east ").unwrap(), "#east");
        assert_eq!(parse_role_token("@router-a").unwrap(), "@router-a");
        assert!(parse_role_token("east").is_err());
        assert!(parse_role_token("#").is_err());
    }
}
