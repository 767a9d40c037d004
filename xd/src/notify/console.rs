//! Terminal notification sink for the CLI

use colored::*;

use super::bus::NotificationSink;
use super::types::{Notification, NotificationKind};

/// Prints notifications to stdout, one line each
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }

    /// Render one notification line
    pub fn format(notification: &Notification) -> String {
        let marker = match notification.kind {
            NotificationKind::Success => "✓".green(),
            NotificationKind::Error => "✗".red(),
            NotificationKind::Warning => "!".yellow(),
            NotificationKind::Info => "i".cyan(),
        };

        let mut line = format!("{} {}: {}", marker, notification.title.bold(), notification.message);
        if let Some(action) = &notification.action {
            line.push_str(&format!(" [{}]", action.label().dimmed()));
        }
        line
    }
}

impl NotificationSink for ConsoleSink {
    fn notify(&self, notification: Notification) {
        println!("{}", Self::format(&notification));
    }
}
