//! `ziti-console`: operator CLI over the Ziti admin console core.
//!
//! Configuration is layered: `--config` file (or `ZITI_CONSOLE_CONFIG`),
//! then `ZITI_CONSOLE_CONTROLLER` / `ZITI_CONSOLE_SESSION`, then flags.
//! Logs go to stderr (`RUST_LOG` controls verbosity); results go to stdout.

#![forbid(unsafe_code)]

mod context;
mod policy;
mod routers;
mod signers;

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use ziti_console_core::models::RoleCategory;
use ziti_console_core::resolver::NamedAttributeResolver;

use context::{Context, GlobalArgs};
use policy::PolicyAction;
use routers::RouterAction;
use signers::{SessionAction, SignerAction};

/// Ziti admin console from the command line.
#[derive(Parser, Debug)]
#[command(name = "ziti-console", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Edge router policies.
    #[command(subcommand)]
    EdgeRouterPolicy(PolicyAction),
    /// Edge routers.
    #[command(subcommand)]
    EdgeRouters(RouterAction),
    /// External JWT signers.
    #[command(subcommand)]
    JwtSigners(SignerAction),
    /// API sessions.
    #[command(subcommand)]
    ApiSessions(SessionAction),
    /// List role attributes in use for a category.
    RoleAttributes {
        /// Entity category.
        #[arg(value_enum)]
        category: CategoryArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    EdgeRouters,
    Identities,
    Services,
}

impl From<CategoryArg> for RoleCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::EdgeRouters => Self::EdgeRouters,
            CategoryArg::Identities => Self::Identities,
            CategoryArg::Services => Self::Services,
        }
    }
}

/// Exit code when a JWT signer delete check is blocked.
const EXIT_BLOCKED: u8 = 2;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.log_json);

    match run(&cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let ctx = Context::from_args(&cli.global)?;

    match &cli.command {
        Command::EdgeRouterPolicy(action) => policy::run(&ctx, action).await?,
        Command::EdgeRouters(action) => routers::run(&ctx, action).await?,
        Command::JwtSigners(action) => {
            if !signers::run_signers(&ctx, action).await? {
                return Ok(ExitCode::from(EXIT_BLOCKED));
            }
        }
        Command::ApiSessions(action) => signers::run_sessions(&ctx, action).await?,
        Command::RoleAttributes { category } => {
            let category = RoleCategory::from(*category);
            let resolver = NamedAttributeResolver::new(ctx.client.clone())
                .with_page_size(ctx.config.page_size);
            let attributes = resolver
                .role_attributes(category)
                .await
                .with_context(|| format!("Failed to list {} role attributes", category.label()))?;
            for attribute in attributes {
                println!("{attribute}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
