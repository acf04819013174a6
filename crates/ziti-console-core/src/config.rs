//! Console configuration.
//!
//! Values come from a TOML file, then the `ZITI_CONSOLE_*` environment
//! variables, then command-line flags; each layer overrides the previous one.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, ConsoleResult};
use crate::form::FormOptions;

/// Environment variable overriding `controller_url`.
pub const ENV_CONTROLLER: &str = "ZITI_CONSOLE_CONTROLLER";
/// Environment variable overriding `session_token`.
pub const ENV_SESSION: &str = "ZITI_CONSOLE_SESSION";
/// Environment variable naming the config file.
pub const ENV_CONFIG: &str = "ZITI_CONSOLE_CONFIG";

/// Settings for talking to one controller.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Controller base URL, e.g. `https://ctrl.example.com:1280`.
    pub controller_url: String,

    /// `zt-session` token of an authenticated API session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Path of the edge management API under the controller.
    #[serde(default = "default_management_path")]
    pub management_path: String,

    /// Page size for named-attribute listings.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Rows shown in a preview before "show more results...".
    #[serde(default = "default_preview_limit")]
    pub preview_limit: u32,

    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Accept self-signed controller certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_management_path() -> String {
    "/edge/management/v1".into()
}

const fn default_page_size() -> u32 {
    crate::DEFAULT_PAGE_SIZE
}

const fn default_preview_limit() -> u32 {
    crate::DEFAULT_PREVIEW_LIMIT
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

impl fmt::Debug for ConsoleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleConfig")
            .field("controller_url", &self.controller_url)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("management_path", &self.management_path)
            .field("page_size", &self.page_size)
            .field("preview_limit", &self.preview_limit)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

impl ConsoleConfig {
    /// Config for a controller with every other field at its default.
    #[must_use]
    pub fn new(controller_url: impl Into<String>) -> Self {
        Self {
            controller_url: controller_url.into(),
            session_token: None,
            management_path: default_management_path(),
            page_size: default_page_size(),
            preview_limit: default_preview_limit(),
            request_timeout_ms: default_request_timeout_ms(),
            accept_invalid_certs: false,
        }
    }

    /// Builder: set the session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    /// Returns `ConsoleError::Config` if the document is malformed.
    pub fn from_toml_str(contents: &str) -> ConsoleResult<Self> {
        toml::from_str(contents)
            .map_err(|e| ConsoleError::Config(format!("Invalid console configuration: {e}")))
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    /// Returns `ConsoleError::Config` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> ConsoleResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_CONTROLLER).filter(|v| !v.trim().is_empty()) {
            self.controller_url = url;
        }
        if let Some(token) = lookup(ENV_SESSION).filter(|v| !v.trim().is_empty()) {
            self.session_token = Some(token);
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Validate and normalize the configuration.
    ///
    /// # Errors
    /// Returns `ConsoleError::Config` if a value is missing or out of range.
    pub fn validate(&mut self) -> ConsoleResult<()> {
        self.controller_url = normalize_base_url(&self.controller_url)?;

        if !self.management_path.starts_with('/') {
            return Err(ConsoleError::Config(
                "management_path must start with '/'".into(),
            ));
        }
        self.management_path = self.management_path.trim_end_matches('/').to_string();

        if !(1..=1000).contains(&self.page_size) {
            return Err(ConsoleError::Config(
                "page_size must be between 1 and 1000".into(),
            ));
        }
        if !(1..=100).contains(&self.preview_limit) {
            return Err(ConsoleError::Config(
                "preview_limit must be between 1 and 100".into(),
            ));
        }
        if !(1..=600_000).contains(&self.request_timeout_ms) {
            return Err(ConsoleError::Config(
                "request_timeout_ms must be between 1 and 600000".into(),
            ));
        }
        Ok(())
    }

    /// Base URL of the management API, without a trailing `/`.
    #[must_use]
    pub fn management_url(&self) -> String {
        format!("{}{}", self.controller_url, self.management_path)
    }

    /// Limits applied by form controllers.
    #[must_use]
    pub const fn form_options(&self) -> FormOptions {
        FormOptions {
            page_size: self.page_size,
            preview_limit: self.preview_limit,
        }
    }
}

/// Check that a controller URL is http(s) with a host and trim trailing `/`.
///
/// # Errors
/// Returns `ConsoleError::Config` if the URL is empty, unparsable, not
/// http(s), or has no host.
pub fn normalize_base_url(base_url: &str) -> ConsoleResult<String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(ConsoleError::Config("controller_url cannot be empty".into()));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| ConsoleError::Config(format!("Invalid controller_url: {e}")))?;

    if !matches!(parsed.scheme(), "https" | "http") {
        return Err(ConsoleError::Config(
            "controller_url must be http or https".into(),
        ));
    }

    if parsed.host_str().is_none() {
        return Err(ConsoleError::Config(
            "controller_url must include a host".into(),
        ));
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}
