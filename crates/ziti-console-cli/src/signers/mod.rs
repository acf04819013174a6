//! `ziti-console jwt-signers` and `ziti-console api-sessions` commands.

use anyhow::{Context as _, Result};
use clap::Subcommand;
use ziti_console_core::api::{ListQuery, ManagementApi};
use ziti_console_core::pages::{
    ApiSession, SignerDeleteCheck, api_session_label, check_jwt_signer_delete,
};

use crate::context::Context;

/// External JWT signer subcommands.
#[derive(Subcommand, Debug)]
pub enum SignerAction {
    /// Check whether signers can be deleted (exit code 2 when in use).
    CheckDelete {
        /// Signer ids.
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

/// API session subcommands.
#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// List API sessions with their delete labels.
    List,
}

/// Outcome of a signer command; `false` when deletion is blocked.
pub async fn run_signers(ctx: &Context, action: &SignerAction) -> Result<bool> {
    match action {
        SignerAction::CheckDelete { ids } => {
            let check = check_jwt_signer_delete(ctx.client.as_ref(), ids, ctx.config.page_size)
                .await
                .context("Failed to check external JWT signer usage")?;
            match check {
                SignerDeleteCheck::Allowed { label } => {
                    println!("OK to delete {} {label}", ids.len());
                    Ok(true)
                }
                SignerDeleteCheck::Blocked {
                    title,
                    message,
                    submessage,
                    names,
                } => {
                    println!("{title}");
                    println!("{message}");
                    for name in names {
                        println!("  - {name}");
                    }
                    println!("{submessage}");
                    Ok(false)
                }
            }
        }
    }
}

/// Run an API session subcommand.
pub async fn run_sessions(ctx: &Context, action: &SessionAction) -> Result<()> {
    match action {
        SessionAction::List => {
            let query = ListQuery::with_limit(ctx.config.page_size).unsorted();
            let sessions: Vec<ApiSession> = ctx
                .client
                .list("api-sessions", &query)
                .await
                .context("Failed to list API sessions")?
                .items()?;
            for session in &sessions {
                println!("{}", api_session_label(session));
            }
            Ok(())
        }
    }
}
