//! Configuration layering and client construction shared by all commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use ziti_console_client::ManagementClient;
use ziti_console_core::config::ConsoleConfig;
use ziti_console_core::notify::{Notifier, TracingNotifier};

/// Connection flags accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// TOML configuration file.
    #[arg(long, global = true, env = "ZITI_CONSOLE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Controller base URL (overrides file and environment).
    #[arg(long, global = true, value_name = "URL")]
    pub controller: Option<String>,

    /// `zt-session` token (overrides file and environment).
    #[arg(long, global = true, value_name = "TOKEN")]
    pub session: Option<String>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,
}

/// Resolved configuration plus the client built from it.
pub struct Context {
    pub config: ConsoleConfig,
    pub client: Arc<ManagementClient>,
    pub notifier: Arc<dyn Notifier>,
}

impl Context {
    /// Layer file, environment and flags, then build the client.
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let config = resolve_config(args)?;
        let client = ManagementClient::new(&config).context("Failed to build management client")?;
        tracing::debug!(?config, "configuration resolved");
        Ok(Self {
            config,
            client: Arc::new(client),
            notifier: Arc::new(TracingNotifier),
        })
    }
}

/// File, then `ZITI_CONSOLE_*` environment, then flags.
pub fn resolve_config(args: &GlobalArgs) -> Result<ConsoleConfig> {
    let mut config = match &args.config {
        Some(path) => ConsoleConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConsoleConfig::new(""),
    };
    config.apply_env();

    if let Some(controller) = &args.controller {
        config.controller_url.clone_from(controller);
    }
    if let Some(session) = &args.session {
        config.session_token = Some(session.clone());
    }

    if config.controller_url.trim().is_empty() {
        anyhow::bail!(
            "No controller configured: pass --controller, set ZITI_CONSOLE_CONTROLLER, or use --config"
        );
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
