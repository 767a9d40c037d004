//! User-facing notifications
//!
//! - [`TransitionTracker`] turns job list changes into one-shot notifications
//! - [`NotificationBus`] and [`ConsoleSink`] deliver them
//! - [`Notifier`] is the handle the poller and action handlers hold

mod bus;
mod console;
mod emitter;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, NotificationBus, NotificationSink, Notifier};
pub use console::ConsoleSink;
pub use emitter::{TransitionTracker, notification_for, spawn_emitter};
pub use types::{DEFAULT_DURATION, Notification, NotificationAction, NotificationKind};
