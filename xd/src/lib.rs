//! exportdesk - Export job lifecycle tracker
//!
//! Tracks data exports running on a backend service: creates them, polls the
//! ones still in flight, raises one notification per status transition, and
//! bounds retries of failed operations.
//!
//! # Core Concepts
//!
//! - **Owned State**: the job list lives in a [`JobStore`] actor; nothing is global
//! - **Explicit Polling**: the [`Poller`] runs on a task you hold a handle to
//! - **One-shot Notifications**: transitions are diffed, never re-announced
//! - **Bounded Retries**: three attempts per operation, then terminal failure
//!
//! # Modules
//!
//! - [`api`] - Export backend client trait and HTTP implementation
//! - [`store`] - Job store actor
//! - [`poller`] - Status polling loop
//! - [`notify`] - Notifications, sinks and transition tracking
//! - [`retry`] - Retry budget tracking
//! - [`actions`] - User action handlers
//! - [`view`] - Job list view model
//! - [`filters`] - Export filter payloads and validation
//! - [`debounce`] - Debounce utility
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod actions;
pub mod api;
pub mod cli;
pub mod config;
pub mod debounce;
pub mod domain;
pub mod filters;
pub mod notify;
pub mod poller;
pub mod retry;
pub mod store;
pub mod view;

// Re-export commonly used types
pub use actions::{ExportActions, export_file_name};
pub use api::{ApiError, ExportApi, ExportDownload, HttpExportApi};
pub use config::Config;
pub use debounce::Debouncer;
pub use domain::{ExportJob, ExportKind, ExportStatus};
pub use filters::{ExportFilters, FilterError};
pub use notify::{
    ConsoleSink, Notification, NotificationAction, NotificationBus, NotificationKind, NotificationSink, Notifier,
    TransitionTracker, spawn_emitter,
};
pub use poller::{Poller, PollerHandle};
pub use retry::{DEFAULT_MAX_RETRIES, Operation, OperationType, RetryTracker};
pub use store::{JobStore, StoreError, StoreEvent};
pub use view::JobListView;
