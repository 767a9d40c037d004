//! Transition notifications
//!
//! Compares successive job list snapshots and produces one notification per
//! status change. Jobs seen for the first time only establish a baseline.

use std::collections::HashMap;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::bus::Notifier;
use super::types::{Notification, NotificationAction};
use crate::domain::{ExportJob, ExportStatus};
use crate::store::{JobStore, StoreEvent};

/// Remembers the last status seen for each job
#[derive(Debug, Default)]
pub struct TransitionTracker {
    seen: HashMap<String, ExportStatus>,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `jobs` against the previous snapshot
    pub fn observe(&mut self, jobs: &[ExportJob]) -> Vec<Notification> {
        let mut notifications = Vec::new();
        let mut current = HashMap::with_capacity(jobs.len());

        for job in jobs {
            match self.seen.get(&job.id) {
                Some(previous) if *previous != job.status => {
                    debug!(id = %job.id, from = %previous, to = %job.status, "observe: transition");
                    notifications.extend(notification_for(job));
                }
                Some(_) => {}
                None => {
                    debug!(id = %job.id, status = %job.status, "observe: baseline");
                }
            }
            current.insert(job.id.clone(), job.status);
        }

        // Deleted jobs drop out here
        self.seen = current;
        notifications
    }

    pub fn last_status(&self, job_id: &str) -> Option<ExportStatus> {
        self.seen.get(job_id).copied()
    }
}

/// The notification announcing that `job` reached its current status
pub fn notification_for(job: &ExportJob) -> Option<Notification> {
    let label = job.kind.label();
    match job.status {
        ExportStatus::Processing => None,
        ExportStatus::Completed => {
            let message = if job.total_records > 0 {
                format!(
                    "{} export {} is ready ({} records)",
                    label, job.id, job.total_records
                )
            } else {
                format!("{} export {} is ready", label, job.id)
            };
            Some(
                Notification::success("Export Ready", message).with_action(NotificationAction::Download {
                    job_id: job.id.clone(),
                }),
            )
        }
        ExportStatus::Failed => {
            let reason = job.error.as_deref().unwrap_or("unknown error");
            Some(Notification::error(
                "Export Failed",
                format!("{} export {} failed: {}", label, job.id, reason),
            ))
        }
        ExportStatus::Expired => Some(Notification::info(
            "Export Expired",
            format!("{} export {} has expired", label, job.id),
        )),
    }
}

/// Forward store transitions to a notifier until the store goes away
pub fn spawn_emitter(store: &JobStore, notifier: Notifier) -> JoinHandle<()> {
    debug!("spawn_emitter: called");
    let mut events = store.subscribe();
    let store = store.clone();

    tokio::spawn(async move {
        let mut tracker = TransitionTracker::new();
        match store.jobs().await {
            Ok(jobs) => {
                tracker.observe(&jobs);
            }
            Err(e) => warn!(error = %e, "spawn_emitter: could not seed baseline"),
        }
        // The task only needs the broadcast from here on
        drop(store);

        loop {
            match events.recv().await {
                Ok(StoreEvent::JobsChanged { jobs }) => {
                    for notification in tracker.observe(&jobs) {
                        notifier.send(notification);
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    debug!(n, "spawn_emitter: lagged, next snapshot catches up");
                }
                Err(RecvError::Closed) => {
                    debug!("spawn_emitter: store closed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExportKind;
    use crate::notify::NotificationKind;
    use serde_json::Value;

    fn job(id: &str, status: ExportStatus) -> ExportJob {
        let mut job = ExportJob::new(id, ExportKind::Hotel, Value::Null);
        job.status = status;
        job
    }

    #[test]
    fn test_first_sighting_is_baseline() {
        let mut tracker = TransitionTracker::new();
        let notes = tracker.observe(&[job("a", ExportStatus::Completed)]);
        assert!(notes.is_empty());
        assert_eq!(tracker.last_status("a"), Some(ExportStatus::Completed));
    }

    #[test]
    fn test_completed_transition_fires_once() {
        let mut tracker = TransitionTracker::new();
        tracker.observe(&[job("a", ExportStatus::Processing)]);

        let notes = tracker.observe(&[job("a", ExportStatus::Completed)]);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Success);
        assert_eq!(
            notes[0].action,
            Some(NotificationAction::Download {
                job_id: "a".to_string()
            })
        );

        let notes = tracker.observe(&[job("a", ExportStatus::Completed)]);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_kind_per_status() {
        let mut tracker = TransitionTracker::new();
        tracker.observe(&[job("a", ExportStatus::Processing), job("b", ExportStatus::Processing)]);

        let mut failed = job("a", ExportStatus::Failed);
        failed.error = Some("supplier timeout".to_string());
        let notes = tracker.observe(&[failed, job("b", ExportStatus::Expired)]);

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].kind, NotificationKind::Error);
        assert!(notes[0].message.contains("supplier timeout"));
        assert!(!notes[0].auto_dismiss);
        assert_eq!(notes[1].kind, NotificationKind::Info);
    }

    #[test]
    fn test_back_to_processing_is_silent() {
        let mut tracker = TransitionTracker::new();
        tracker.observe(&[job("a", ExportStatus::Failed)]);
        assert!(tracker.observe(&[job("a", ExportStatus::Processing)]).is_empty());
    }

    #[test]
    fn test_deleted_jobs_are_forgotten() {
        let mut tracker = TransitionTracker::new();
        tracker.observe(&[job("a", ExportStatus::Processing)]);
        tracker.observe(&[]);
        assert_eq!(tracker.last_status("a"), None);

        // Reappearing counts as a fresh baseline
        assert!(tracker.observe(&[job("a", ExportStatus::Completed)]).is_empty());
    }
}
