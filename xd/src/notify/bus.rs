//! Notification sinks
//!
//! NotificationBus fans notifications out over a tokio broadcast channel to
//! whatever renders them. Notifier is the handle producers hold.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::Notification;

/// Default channel capacity (notifications)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Anything that can display a notification
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Broadcast-backed sink for embedding applications and tests
pub struct NotificationBus {
    tx: broadcast::Sender<Notification>,
}

impl NotificationBus {
    /// Create a new bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "NotificationBus::new: creating notification bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to notifications emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        debug!("NotificationBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl NotificationSink for NotificationBus {
    /// Fire-and-forget: dropped when nobody is listening
    fn notify(&self, notification: Notification) {
        debug!(kind = ?notification.kind, title = %notification.title, "NotificationBus::notify");
        let _ = self.tx.send(notification);
    }
}

/// Producer-side handle that stamps the configured display duration
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    duration: Duration,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, duration: Duration) -> Self {
        Self { sink, duration }
    }

    pub fn send(&self, notification: Notification) {
        let notification = if notification.auto_dismiss {
            notification.with_duration(self.duration)
        } else {
            notification
        };
        self.sink.notify(notification);
    }
}
