//! `ziti-console edge-routers` commands.

use anyhow::{Context as _, Result, bail};
use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;
use ziti_console_core::api::ListQuery;
use ziti_console_core::pages::{EdgeRouterRow, list_edge_routers, re_enroll_edge_router};

use crate::context::Context;

/// Edge router subcommands.
#[derive(Subcommand, Debug)]
pub enum RouterAction {
    /// List edge routers with their row actions.
    List(ListArgs),
    /// Issue a new enrollment JWT for a router.
    ReEnroll {
        /// Router id.
        id: String,

        /// Confirm that a connected router will be disconnected.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

/// Paging and filter flags.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// 1-based page number.
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Rows per page (defaults to the configured page size).
    #[arg(long)]
    pub limit: Option<u32>,

    /// Filter predicate, e.g. `name contains "east"`.
    #[arg(long)]
    pub filter: Option<String>,

    /// Output JSON instead of a table.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouterListing<'a> {
    rows: &'a [EdgeRouterRow],
    total_count: u64,
}

/// Run an edge router subcommand.
pub async fn run(ctx: &Context, action: &RouterAction) -> Result<()> {
    match action {
        RouterAction::List(args) => list(ctx, args).await,
        RouterAction::ReEnroll { id, yes } => re_enroll(ctx, id, *yes).await,
    }
}

async fn re_enroll(ctx: &Context, id: &str, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!(
            "Re-enrolling disconnects router {id} until it enrolls with the new JWT; pass --yes to confirm"
        );
    }
    re_enroll_edge_router(ctx.client.as_ref(), ctx.notifier.as_ref(), id)
        .await
        .with_context(|| format!("Failed to re-enroll edge router {id}"))?;
    println!("Router re-enroll was sent. A new enrollment token is now available");
    Ok(())
}

async fn list(ctx: &Context, args: &ListArgs) -> Result<()> {
    let mut query = ListQuery::with_limit(args.limit.unwrap_or(ctx.config.page_size)).page(args.page);
    if let Some(filter) = &args.filter {
        query = query.filter(filter.clone());
    }

    let (rows, total_count) = list_edge_routers(ctx.client.as_ref(), &query, Utc::now())
        .await
        .context("Failed to list edge routers")?;

    if args.json {
        let listing = RouterListing {
            rows: &rows,
            total_count,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!(
        "{:<24} {:<8} {:<9} {:<8} {:<20} ACTIONS",
        "NAME", "ONLINE", "VERIFIED", "OS", "TOKEN"
    );
    for row in &rows {
        let actions: Vec<&str> = row.actions.iter().map(|action| action.as_str()).collect();
        println!(
            "{:<24} {:<8} {:<9} {:<8} {:<20} {}",
            row.router.name,
            yes_no(row.router.is_online),
            yes_no(row.router.is_verified),
            row.os.as_str(),
            truncate(&row.token, 20),
            actions.join(",")
        );
    }
    println!("{} of {total_count} edge routers", rows.len());
    Ok(())
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
