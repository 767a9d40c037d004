//! Action handlers
//!
//! The boundary where user intents run. Every failure is turned into a
//! notification here; nothing propagates past these methods.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{ExportJob, ExportKind, ExportStatus};
use crate::notify::{Notification, NotificationAction, Notifier};
use crate::retry::{Operation, RetryTracker};
use crate::store::JobStore;

/// File name for a downloaded export: `{kind}_export_{date}.{format}`
pub fn export_file_name(kind: ExportKind, date: NaiveDate, format: &str) -> String {
    format!("{}_export_{}.{}", kind, date.format("%Y-%m-%d"), format)
}

/// Runs create/download/retry on behalf of the user
#[derive(Clone)]
pub struct ExportActions {
    store: JobStore,
    retries: Arc<RetryTracker>,
    notifier: Notifier,
    download_dir: PathBuf,
}

impl ExportActions {
    pub fn new(store: JobStore, retries: Arc<RetryTracker>, notifier: Notifier, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            retries,
            notifier,
            download_dir: download_dir.into(),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn retries(&self) -> &RetryTracker {
        &self.retries
    }

    /// Start an export; None if the backend refused
    pub async fn create(&self, kind: ExportKind, filters: Value) -> Option<ExportJob> {
        debug!(%kind, "create: called");
        let operation = Operation::Create {
            kind,
            filters: filters.clone(),
        };

        match self.store.create_export(kind, filters).await {
            Ok(job) => {
                self.retries.reset_op(&operation);
                self.notifier.send(Notification::info(
                    "Export Started",
                    format!("{} export {} is being prepared", kind.label(), job.id),
                ));
                Some(job)
            }
            Err(e) => {
                self.report_failure(&operation, "Export Failed", &e, e.is_retryable());
                None
            }
        }
    }

    /// Run a failed operation again if its budget allows; true on success
    pub async fn retry(&self, operation: &Operation) -> bool {
        debug!(?operation, "retry: called");
        if !self.retries.can_retry_op(operation) {
            self.report_exhausted(operation, "Retry Limit Reached");
            return false;
        }

        let attempt = self.retries.increment_op(operation);
        info!(op = %operation.op_type(), attempt, "Retrying operation");

        match operation {
            Operation::Create { kind, filters } => self.create(*kind, filters.clone()).await.is_some(),
            Operation::Refresh { job_id } => match self.store.refresh_status(job_id).await {
                Ok(()) => {
                    self.retries.reset_op(operation);
                    true
                }
                Err(e) => {
                    self.report_failure(operation, "Status Refresh Failed", &e, e.is_retryable());
                    false
                }
            },
            Operation::Download { job_id } => self.download(job_id).await.is_some(),
        }
    }

    /// Download a completed export into the configured directory
    ///
    /// Unknown, unfinished and expired jobs are rejected before any network
    /// call.
    pub async fn download(&self, job_id: &str) -> Option<PathBuf> {
        debug!(%job_id, "download: called");
        let job = match self.store.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                self.notifier.send(Notification::warning(
                    "Export Not Found",
                    format!("No export with id {} is being tracked", job_id),
                ));
                return None;
            }
            Err(e) => {
                warn!(%job_id, error = %e, "download: store unavailable");
                self.notifier
                    .send(Notification::error("Download Failed", format!("Job store unavailable: {}", e)));
                return None;
            }
        };

        match job.status {
            ExportStatus::Completed => {}
            ExportStatus::Expired => {
                debug!(%job_id, "download: job expired");
                self.notifier.send(
                    Notification::warning(
                        "Export Expired",
                        format!("{} export {} has expired. Create a new export to download it.", job.kind.label(), job.id),
                    )
                    .with_action(NotificationAction::CreateNew {
                        kind: job.kind,
                        filters: job.filters.clone(),
                    }),
                );
                return None;
            }
            ExportStatus::Processing | ExportStatus::Failed => {
                debug!(%job_id, status = %job.status, "download: job not completed");
                self.notifier.send(Notification::warning(
                    "Export Not Ready",
                    format!("{} export {} is {}, not completed", job.kind.label(), job.id, job.status),
                ));
                return None;
            }
        }

        let operation = Operation::Download {
            job_id: job_id.to_string(),
        };

        let download = match self.store.api().download_export(job_id).await {
            Ok(download) => download,
            Err(e) => {
                self.report_failure(&operation, "Download Failed", &e, e.is_retryable());
                return None;
            }
        };

        let file_name = export_file_name(job.kind, Local::now().date_naive(), &download.format);
        match write_download(&self.download_dir, &file_name, &download.bytes).await {
            Ok(path) => {
                self.retries.reset_op(&operation);
                info!(%job_id, path = %path.display(), "Export downloaded");
                self.notifier.send(Notification::success(
                    "Download Complete",
                    format!("Saved {} export to {}", job.kind.label(), path.display()),
                ));
                Some(path)
            }
            Err(e) => {
                // Local write errors (disk full, permissions) may clear up
                self.report_failure(&operation, "Download Failed", &e, true);
                None
            }
        }
    }

    /// Error notification offering a retry while budget remains
    ///
    /// Failures a retry cannot fix are reported without the action.
    fn report_failure(&self, operation: &Operation, title: &str, error: &dyn Display, retryable: bool) {
        warn!(op = %operation.op_type(), %error, retryable, "{}", title);
        if !retryable {
            self.notifier.send(Notification::error(title, error.to_string()));
        } else if self.retries.can_retry_op(operation) {
            let remaining = self.retries.max_retries() - self.retries.retry_count_for(operation);
            self.notifier.send(
                Notification::error(title, format!("{} ({} retries left)", error, remaining)).with_action(
                    NotificationAction::Retry {
                        operation: operation.clone(),
                    },
                ),
            );
        } else {
            self.report_exhausted(operation, title);
        }
    }

    /// Terminal failure: no retry action
    fn report_exhausted(&self, operation: &Operation, title: &str) {
        let attempts = self.retries.retry_count_for(operation);
        self.notifier.send(Notification::error(
            title,
            format!(
                "The {} operation failed after {} attempts and will not be retried",
                operation.op_type(),
                attempts
            ),
        ));
    }
}

async fn write_download(dir: &Path, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
