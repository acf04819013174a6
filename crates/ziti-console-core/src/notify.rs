//! Transient user notifications ("growler" messages).
//!
//! Form operations report their outcome through a [`Notifier`]; the CLI logs
//! them and tests record them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Operation succeeded.
    Success,
    /// Informational.
    Info,
    /// Something needs attention.
    Warning,
    /// Operation failed.
    Error,
}

impl Level {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity.
    pub level: Level,
    /// Headline (`Success`, `Error`).
    pub title: String,
    /// Secondary line, e.g. `Edge Router Policy Created`.
    pub subtitle: String,
    /// Detail text.
    pub message: String,
    /// When the notification was raised.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Create a notification stamped with the current time.
    #[must_use]
    pub fn new(
        level: Level,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            title: title.into(),
            subtitle: subtitle.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Success notification.
    #[must_use]
    pub fn success(
        title: impl Into<String>,
        subtitle: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Level::Success, title, subtitle, message)
    }

    /// Error notification.
    #[must_use]
    pub fn error(
        title: impl Into<String>,
        subtitle: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Level::Error, title, subtitle, message)
    }
}

/// Delivery backend for notifications.
pub trait Notifier: Send + Sync {
    /// Show one notification. Delivery never fails the caller.
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the tracing pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            Level::Success | Level::Info => {
                info!(level = %n.level, title = %n.title, message = %n.message, "{}", n.subtitle);
            }
            Level::Warning => warn!(title = %n.title, message = %n.message, "{}", n.subtitle),
            Level::Error => error!(title = %n.title, message = %n.message, "{}", n.subtitle),
        }
    }
}
