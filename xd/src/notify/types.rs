//! Notification types
//!
//! Notifications are ephemeral: produced once, handed to a sink, never stored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::domain::ExportKind;
use crate::retry::Operation;

/// Default display time for auto-dismissing notifications
pub const DEFAULT_DURATION: Duration = Duration::from_secs(5);

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

/// Follow-up the consumer can offer alongside a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationAction {
    /// Download the finished export
    Download { job_id: String },
    /// Run a failed operation again
    Retry { operation: Operation },
    /// Start a fresh export with the same filters
    CreateNew { kind: ExportKind, filters: Value },
}

impl NotificationAction {
    /// Button label for this action
    pub fn label(&self) -> &'static str {
        match self {
            Self::Download { .. } => "Download",
            Self::Retry { .. } => "Retry",
            Self::CreateNew { .. } => "Create New",
        }
    }
}

/// A user-facing notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub action: Option<NotificationAction>,
    /// Errors stay until dismissed; everything else goes away on its own
    pub auto_dismiss: bool,
    pub duration: Duration,
}

impl Notification {
    fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            action: None,
            auto_dismiss: kind != NotificationKind::Error,
            duration: DEFAULT_DURATION,
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, message)
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}
