//! JobStore - actor that owns the export job list
//!
//! Network calls run on the caller's task; only their results are sent to
//! the actor, which applies each one as a single step.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use super::messages::{StoreCommand, StoreError, StoreEvent, StoreResponse};
use crate::api::ExportApi;
use crate::domain::{ExportJob, ExportKind};

/// Capacity of the command channel
const COMMAND_CAPACITY: usize = 256;

/// Capacity of the change broadcast
const EVENT_CAPACITY: usize = 64;

/// Handle to send commands to the JobStore actor
#[derive(Clone)]
pub struct JobStore {
    tx: mpsc::Sender<StoreCommand>,
    /// Broadcast sender for change notifications
    event_tx: broadcast::Sender<StoreEvent>,
    api: Arc<dyn ExportApi>,
}

impl JobStore {
    /// Spawn a new JobStore actor with an empty job list
    pub fn spawn(api: Arc<dyn ExportApi>) -> Self {
        debug!("JobStore::spawn: called");
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        tokio::spawn(actor_loop(Vec::new(), rx, event_tx.clone()));

        info!("JobStore spawned");
        Self { tx, event_tx, api }
    }

    /// Subscribe to job list changes
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    /// The API client this store talks to
    pub fn api(&self) -> Arc<dyn ExportApi> {
        Arc::clone(&self.api)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> StoreCommand) -> StoreResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)
    }

    /// Start an export on the backend and track it
    ///
    /// The job is appended as processing with progress 0. On failure nothing
    /// is added.
    pub async fn create_export(&self, kind: ExportKind, filters: Value) -> StoreResponse<ExportJob> {
        debug!(%kind, "create_export: called");
        let created = self.api.create_export(kind, &filters).await?;

        let mut job = created.into_accepted();
        if job.filters.is_null() {
            job.filters = filters;
        }

        self.request(|reply| StoreCommand::Insert {
            job: job.clone(),
            reply,
        })
        .await?;

        info!(id = %job.id, %kind, "Export created");
        Ok(job)
    }

    /// Start tracking a job created outside this store (e.g. an earlier session)
    ///
    /// The record is kept as the server reported it.
    pub async fn track(&self, job: ExportJob) -> StoreResponse<()> {
        debug!(id = %job.id, status = %job.status, "track: called");
        self.request(|reply| StoreCommand::Insert { job, reply }).await
    }

    /// Pull the latest server state for one job
    ///
    /// Prior state is untouched when the backend call fails.
    pub async fn refresh_status(&self, job_id: &str) -> StoreResponse<()> {
        debug!(%job_id, "refresh_status: called");
        let mut update = self.api.export_status(job_id).await?;
        update.id = job_id.to_string();

        let applied = self.request(|reply| StoreCommand::ApplyUpdate { update, reply }).await?;
        if !applied {
            debug!(%job_id, "refresh_status: job no longer tracked, dropping update");
        }
        Ok(())
    }

    /// Remove a job; unknown ids are ignored
    pub async fn delete_job(&self, job_id: &str) -> StoreResponse<()> {
        debug!(%job_id, "delete_job: called");
        let removed = self
            .request(|reply| StoreCommand::Delete {
                id: job_id.to_string(),
                reply,
            })
            .await?;
        debug!(%job_id, removed, "delete_job: done");
        Ok(())
    }

    /// Remove every completed, failed or expired job
    pub async fn clear_completed(&self) -> StoreResponse<usize> {
        debug!("clear_completed: called");
        let removed = self.request(|reply| StoreCommand::ClearCompleted { reply }).await?;
        info!(removed, "Cleared finished exports");
        Ok(removed)
    }

    /// Snapshot of all known jobs (unordered)
    pub async fn jobs(&self) -> StoreResponse<Vec<ExportJob>> {
        self.request(|reply| StoreCommand::List { reply }).await
    }

    /// Snapshot of one job
    pub async fn get(&self, job_id: &str) -> StoreResponse<Option<ExportJob>> {
        self.request(|reply| StoreCommand::Get {
            id: job_id.to_string(),
            reply,
        })
        .await
    }

    /// Stop the actor; later calls fail with ChannelError
    pub async fn shutdown(&self) {
        debug!("shutdown: called");
        let _ = self.tx.send(StoreCommand::Shutdown).await;
    }
}

/// The actor loop that owns the job list
async fn actor_loop(
    mut jobs: Vec<ExportJob>,
    mut rx: mpsc::Receiver<StoreCommand>,
    event_tx: broadcast::Sender<StoreEvent>,
) {
    debug!("actor_loop: started");

    while let Some(cmd) = rx.recv().await {
        let changed = match cmd {
            StoreCommand::Insert { job, reply } => {
                debug!(id = %job.id, "actor_loop: Insert");
                match jobs.iter_mut().find(|j| j.id == job.id) {
                    Some(existing) => {
                        warn!(id = %job.id, "actor_loop: duplicate insert, replacing record");
                        *existing = job;
                    }
                    None => jobs.push(job),
                }
                let _ = reply.send(());
                true
            }
            StoreCommand::ApplyUpdate { update, reply } => {
                debug!(id = %update.id, status = %update.status, "actor_loop: ApplyUpdate");
                let applied = match jobs.iter_mut().find(|j| j.id == update.id) {
                    Some(job) => {
                        let before = job.clone();
                        job.apply_update(update);
                        Some(*job != before)
                    }
                    None => None,
                };
                let _ = reply.send(applied.is_some());
                applied.unwrap_or(false)
            }
            StoreCommand::Delete { id, reply } => {
                let before = jobs.len();
                jobs.retain(|j| j.id != id);
                let removed = jobs.len() != before;
                debug!(%id, removed, "actor_loop: Delete");
                let _ = reply.send(removed);
                removed
            }
            StoreCommand::ClearCompleted { reply } => {
                let before = jobs.len();
                jobs.retain(|j| !j.status.is_terminal());
                let removed = before - jobs.len();
                debug!(removed, "actor_loop: ClearCompleted");
                let _ = reply.send(removed);
                removed > 0
            }
            StoreCommand::List { reply } => {
                let _ = reply.send(jobs.clone());
                false
            }
            StoreCommand::Get { id, reply } => {
                let _ = reply.send(jobs.iter().find(|j| j.id == id).cloned());
                false
            }
            StoreCommand::Shutdown => {
                debug!("actor_loop: Shutdown");
                break;
            }
        };

        if changed {
            // No subscribers is fine
            let _ = event_tx.send(StoreEvent::JobsChanged { jobs: jobs.clone() });
        }
    }

    info!("JobStore actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::mock::MockExportApi;
    use crate::domain::ExportStatus;
    use serde_json::json;

    fn setup() -> (Arc<MockExportApi>, JobStore) {
        let api = Arc::new(MockExportApi::new());
        let store = JobStore::spawn(api.clone());
        (api, store)
    }

    #[tokio::test]
    async fn test_create_appends_processing_job() {
        let (api, store) = setup();

        let job = store
            .create_export(ExportKind::Hotel, json!({"suppliers": ["expedia"]}))
            .await
            .unwrap();

        assert_eq!(api.create_calls(), 1);
        let jobs = store.jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, job.id);
        assert_eq!(jobs[0].status, ExportStatus::Processing);
        assert_eq!(jobs[0].progress, 0.0);
        assert_eq!(jobs[0].filters, json!({"suppliers": ["expedia"]}));
    }

    #[tokio::test]
    async fn test_create_failure_adds_nothing() {
        let (api, store) = setup();
        api.set_fail_create(true);

        let result = store.create_export(ExportKind::Mapping, json!({})).await;

        assert!(matches!(result, Err(StoreError::Api(_))));
        assert!(store.jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_only_touches_target() {
        let (api, store) = setup();
        let a = store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let b = store.create_export(ExportKind::Hotel, json!({})).await.unwrap();

        api.update_server_job(&a.id, |job| {
            job.status = ExportStatus::Completed;
            job.progress = 100.0;
        });
        api.update_server_job(&b.id, |job| job.progress = 50.0);

        store.refresh_status(&a.id).await.unwrap();

        let a_now = store.get(&a.id).await.unwrap().unwrap();
        let b_now = store.get(&b.id).await.unwrap().unwrap();
        assert_eq!(a_now.status, ExportStatus::Completed);
        assert_eq!(b_now, b);
    }

    #[tokio::test]
    async fn test_refresh_failure_leaves_state() {
        let (api, store) = setup();
        let job = store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        api.update_server_job(&job.id, |j| j.progress = 70.0);
        api.fail_status_for(&job.id, true);

        assert!(store.refresh_status(&job.id).await.is_err());
        assert_eq!(store.get(&job.id).await.unwrap().unwrap(), job);
    }

    #[tokio::test]
    async fn test_refresh_after_delete_does_not_resurrect() {
        let (_api, store) = setup();
        let job = store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        store.delete_job(&job.id).await.unwrap();

        store.refresh_status(&job.id).await.unwrap();
        assert!(store.jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_is_noop() {
        let (_api, store) = setup();
        store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        store.delete_job("nope").await.unwrap();
        assert_eq!(store.jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_completed_keeps_processing() {
        let (api, store) = setup();
        let processing = store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let completed = store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let failed = store.create_export(ExportKind::Mapping, json!({})).await.unwrap();

        api.update_server_job(&completed.id, |j| j.status = ExportStatus::Completed);
        api.update_server_job(&failed.id, |j| j.status = ExportStatus::Failed);
        store.refresh_status(&completed.id).await.unwrap();
        store.refresh_status(&failed.id).await.unwrap();

        let removed = store.clear_completed().await.unwrap();

        assert_eq!(removed, 2);
        let jobs = store.jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, processing.id);
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let (api, store) = setup();
        let mut events = store.subscribe();

        let job = store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let StoreEvent::JobsChanged { jobs } = events.recv().await.unwrap();
        assert_eq!(jobs.len(), 1);

        // An identical refresh is not a change
        store.refresh_status(&job.id).await.unwrap();
        api.update_server_job(&job.id, |j| j.status = ExportStatus::Expired);
        store.refresh_status(&job.id).await.unwrap();

        let StoreEvent::JobsChanged { jobs } = events.recv().await.unwrap();
        assert_eq!(jobs[0].status, ExportStatus::Expired);
    }

    #[tokio::test]
    async fn test_shutdown_closes_channel() {
        let (_api, store) = setup();
        store.shutdown().await;
        tokio::task::yield_now().await;

        let result = store.jobs().await;
        assert!(matches!(result, Err(StoreError::ChannelError)));
    }
}
