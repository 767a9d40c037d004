//! Status poller
//!
//! Every tick, refreshes each job that is still processing. Failures are
//! logged and counted against the refresh retry budget; the user hears
//! about them only once that budget runs out.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::notify::{Notification, Notifier};
use crate::retry::{OperationType, RetryTracker};
use crate::store::{JobStore, StoreError};

/// Control messages for a running poller
#[derive(Debug)]
enum PollerSignal {
    /// Poll now instead of waiting for the next tick
    TickNow,
    Stop,
}

/// Periodically reconciles the job store with the backend
pub struct Poller {
    store: JobStore,
    retries: Arc<RetryTracker>,
    notifier: Notifier,
    interval: Duration,
}

impl Poller {
    pub fn new(store: JobStore, retries: Arc<RetryTracker>, notifier: Notifier, interval: Duration) -> Self {
        debug!(?interval, "Poller::new: called");
        Self {
            store,
            retries,
            notifier,
            interval,
        }
    }

    /// Start polling on a background task
    ///
    /// The first poll happens immediately.
    pub fn spawn(self) -> PollerHandle {
        debug!("spawn: called");
        let (signal_tx, signal_rx) = mpsc::channel(8);
        let task = tokio::spawn(self.run(signal_rx));
        PollerHandle {
            signal_tx,
            task: Some(task),
        }
    }

    async fn run(self, mut signal_rx: mpsc::Receiver<PollerSignal>) {
        info!(interval_secs = self.interval.as_secs(), "Poller started");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.poll_once().await;
                }
                signal = signal_rx.recv() => {
                    match signal {
                        Some(PollerSignal::TickNow) => {
                            debug!("run: tick requested");
                            self.poll_once().await;
                        }
                        Some(PollerSignal::Stop) | None => {
                            debug!("run: stop requested");
                            break;
                        }
                    }
                }
            }
        }

        info!("Poller stopped");
    }

    /// Refresh every processing job once; returns how many refreshes were issued
    pub async fn poll_once(&self) -> usize {
        let jobs = match self.store.jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "poll_once: could not read job list");
                return 0;
            }
        };

        let tracked: HashSet<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        let processing: Vec<String> = jobs.iter().filter(|j| j.is_processing()).map(|j| j.id.clone()).collect();

        // Budgets of jobs that finished or left the store no longer apply
        self.retries
            .retain(OperationType::Refresh, |id| processing.iter().any(|p| p == id));
        self.retries.retain(OperationType::Download, |id| tracked.contains(id));

        if processing.is_empty() {
            debug!("poll_once: no processing jobs, idle");
            return 0;
        }

        debug!(count = processing.len(), "poll_once: refreshing");
        let results = join_all(processing.iter().map(|id| self.store.refresh_status(id))).await;

        for (id, result) in processing.iter().zip(results) {
            match result {
                Ok(()) => self.retries.reset_retry(OperationType::Refresh, id),
                Err(e) => self.record_failure(id, &e),
            }
        }

        processing.len()
    }

    fn record_failure(&self, job_id: &str, error: &StoreError) {
        warn!(%job_id, %error, "Status refresh failed");

        let had_budget = self.retries.can_retry(OperationType::Refresh, job_id);
        if !error.is_retryable() {
            self.retries.exhaust(OperationType::Refresh, job_id);
            if had_budget {
                self.notifier.send(Notification::error(
                    "Status Refresh Failed",
                    format!("Could not refresh export {}: {}", job_id, error),
                ));
            }
            return;
        }

        let attempts = self.retries.increment_retry(OperationType::Refresh, job_id);

        if had_budget && !self.retries.can_retry(OperationType::Refresh, job_id) {
            self.notifier.send(Notification::error(
                "Status Refresh Failed",
                format!(
                    "Could not refresh export {} after {} attempts: {}",
                    job_id, attempts, error
                ),
            ));
        }
    }
}

/// Owner handle for a running poller
///
/// Dropping the handle aborts the polling task.
pub struct PollerHandle {
    signal_tx: mpsc::Sender<PollerSignal>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Ask for an immediate poll
    pub async fn tick_now(&self) {
        let _ = self.signal_tx.send(PollerSignal::TickNow).await;
    }

    /// Stop polling and wait for the task to finish its current tick
    pub async fn stop(mut self) {
        debug!("PollerHandle::stop: called");
        let _ = self.signal_tx.send(PollerSignal::Stop).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("PollerHandle::drop: aborting poller task");
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::mock::MockExportApi;
    use crate::domain::{ExportJob, ExportKind, ExportStatus};
    use crate::notify::{NotificationBus, NotificationKind};
    use serde_json::json;

    struct Fixture {
        api: Arc<MockExportApi>,
        store: JobStore,
        retries: Arc<RetryTracker>,
        bus: Arc<NotificationBus>,
    }

    impl Fixture {
        fn new() -> Self {
            let api = Arc::new(MockExportApi::new());
            Self {
                store: JobStore::spawn(api.clone()),
                api,
                retries: Arc::new(RetryTracker::default()),
                bus: Arc::new(NotificationBus::default()),
            }
        }

        fn poller(&self, interval: Duration) -> Poller {
            Poller::new(
                self.store.clone(),
                self.retries.clone(),
                Notifier::new(self.bus.clone(), Duration::from_secs(5)),
                interval,
            )
        }
    }

    #[tokio::test]
    async fn test_idle_without_processing_jobs() {
        let fx = Fixture::new();
        let job = fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        fx.api.update_server_job(&job.id, |j| j.status = ExportStatus::Completed);
        fx.store.refresh_status(&job.id).await.unwrap();
        let calls_before = fx.api.status_calls().len();

        let issued = fx.poller(Duration::from_secs(5)).poll_once().await;

        assert_eq!(issued, 0);
        assert_eq!(fx.api.status_calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_one_refresh_per_processing_job() {
        let fx = Fixture::new();
        let a = fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let b = fx.store.create_export(ExportKind::Mapping, json!({})).await.unwrap();
        let done = fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        fx.api.update_server_job(&done.id, |j| j.status = ExportStatus::Completed);
        fx.store.refresh_status(&done.id).await.unwrap();
        let calls_before = fx.api.status_calls().len();

        let issued = fx.poller(Duration::from_secs(5)).poll_once().await;

        assert_eq!(issued, 2);
        let mut calls = fx.api.status_calls().split_off(calls_before);
        calls.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(calls, expected);
    }

    #[tokio::test]
    async fn test_failure_does_not_affect_siblings() {
        let fx = Fixture::new();
        let bad = fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let good = fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        fx.api.fail_status_for(&bad.id, true);
        fx.api.update_server_job(&good.id, |j| j.progress = 60.0);

        fx.poller(Duration::from_secs(5)).poll_once().await;

        let good_now = fx.store.get(&good.id).await.unwrap().unwrap();
        assert_eq!(good_now.progress, 60.0);
        assert_eq!(fx.retries.retry_count(OperationType::Refresh, &bad.id), 1);
        assert_eq!(fx.retries.retry_count(OperationType::Refresh, &good.id), 0);
    }

    #[tokio::test]
    async fn test_exhausted_budget_notifies_once() {
        let fx = Fixture::new();
        let mut rx = fx.bus.subscribe();
        let job = fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        fx.api.fail_status_for(&job.id, true);
        let poller = fx.poller(Duration::from_secs(5));

        for _ in 0..5 {
            poller.poll_once().await;
        }

        let note = rx.try_recv().unwrap();
        assert_eq!(note.kind, NotificationKind::Error);
        assert!(note.message.contains("after 3 attempts"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_job_exhausts_budget_at_once() {
        let fx = Fixture::new();
        let mut rx = fx.bus.subscribe();
        // Known locally, unknown to the backend
        let orphan = ExportJob::new("exp-gone", ExportKind::Hotel, json!({}));
        fx.store.track(orphan).await.unwrap();
        let poller = fx.poller(Duration::from_secs(5));

        poller.poll_once().await;
        assert!(!fx.retries.can_retry(OperationType::Refresh, "exp-gone"));
        let note = rx.try_recv().unwrap();
        assert_eq!(note.kind, NotificationKind::Error);
        assert!(note.message.contains("exp-gone"));

        poller.poll_once().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_budgets_dropped_when_job_leaves() {
        let fx = Fixture::new();
        let job = fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let poller = fx.poller(Duration::from_secs(5));

        fx.api.fail_status_for(&job.id, true);
        poller.poll_once().await;
        fx.retries.increment_retry(OperationType::Download, &job.id);
        assert_eq!(fx.retries.tracked(), 2);

        fx.store.delete_job(&job.id).await.unwrap();
        assert_eq!(poller.poll_once().await, 0);
        assert_eq!(fx.retries.tracked(), 0);
    }

    #[tokio::test]
    async fn test_refresh_budget_dropped_once_finished() {
        let fx = Fixture::new();
        let job = fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let poller = fx.poller(Duration::from_secs(5));

        fx.api.fail_status_for(&job.id, true);
        poller.poll_once().await;
        assert_eq!(fx.retries.retry_count(OperationType::Refresh, &job.id), 1);

        // Finished through another path, e.g. a manual refresh
        fx.api.fail_status_for(&job.id, false);
        fx.api.update_server_job(&job.id, |j| j.status = ExportStatus::Completed);
        fx.store.refresh_status(&job.id).await.unwrap();

        poller.poll_once().await;
        assert_eq!(fx.retries.tracked(), 0);
    }

    #[tokio::test]
    async fn test_success_resets_budget() {
        let fx = Fixture::new();
        let job = fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let poller = fx.poller(Duration::from_secs(5));

        fx.api.fail_status_for(&job.id, true);
        poller.poll_once().await;
        poller.poll_once().await;
        assert_eq!(fx.retries.retry_count(OperationType::Refresh, &job.id), 2);

        fx.api.fail_status_for(&job.id, false);
        poller.poll_once().await;
        assert_eq!(fx.retries.retry_count(OperationType::Refresh, &job.id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_stopped() {
        let fx = Fixture::new();
        let job = fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let calls_before = fx.api.status_calls().len();

        let handle = fx.poller(Duration::from_secs(5)).spawn();
        assert!(handle.is_running());

        // Immediate first tick, then one at 5s and one at 10s
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        let calls = fx.api.status_calls().len() - calls_before;
        assert_eq!(calls, 3);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fx.api.status_calls().len() - calls_before, 3);
        assert_eq!(fx.store.jobs().await.unwrap()[0].id, job.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_now_polls_immediately() {
        let fx = Fixture::new();
        fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let handle = fx.poller(Duration::from_secs(60)).spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let after_first = fx.api.status_calls().len();

        handle.tick_now().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fx.api.status_calls().len(), after_first + 1);

        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let fx = Fixture::new();
        fx.store.create_export(ExportKind::Hotel, json!({})).await.unwrap();
        let handle = fx.poller(Duration::from_secs(5)).spawn();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let calls = fx.api.status_calls().len();

        drop(handle);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fx.api.status_calls().len(), calls);
    }
}
