//! Job list view model
//!
//! Orders jobs newest first and decides which rows to render. Lists longer
//! than the virtualization threshold only render the visible window.

use crate::domain::ExportJob;

/// Row count above which the list is virtualized
pub const DEFAULT_VIRTUALIZATION_THRESHOLD: usize = 100;

/// A render-ready snapshot of the job list
#[derive(Debug, Clone)]
pub struct JobListView {
    jobs: Vec<ExportJob>,
    threshold: usize,
}

impl JobListView {
    pub fn new(mut jobs: Vec<ExportJob>, threshold: usize) -> Self {
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Self { jobs, threshold }
    }

    /// All jobs, newest first
    pub fn jobs(&self) -> &[ExportJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_virtualized(&self) -> bool {
        self.jobs.len() > self.threshold
    }

    /// Jobs a "Clear Completed" action would remove
    pub fn clear_completed_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.status.is_terminal()).count()
    }

    /// Label for the clear control, None when there is nothing to clear
    pub fn clear_completed_label(&self) -> Option<String> {
        match self.clear_completed_count() {
            0 => None,
            n => Some(format!("Clear Completed ({})", n)),
        }
    }

    pub fn processing_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_processing()).count()
    }

    /// Rows to render for a viewport starting at `offset` showing `height` rows
    ///
    /// Small lists render in full regardless of the viewport.
    pub fn window(&self, offset: usize, height: usize) -> &[ExportJob] {
        if !self.is_virtualized() {
            return &self.jobs;
        }
        let start = offset.min(self.jobs.len());
        let end = start.saturating_add(height).min(self.jobs.len());
        &self.jobs[start..end]
    }

    /// One plain-text line per job
    pub fn format_row(job: &ExportJob) -> String {
        let progress = match job.display_progress() {
            Some(p) => format!("{:>3.0}%", p),
            None => "    ".to_string(),
        };
        let records = if job.total_records > 0 {
            format!("{}/{}", job.processed_records, job.total_records)
        } else {
            "-".to_string()
        };
        format!(
            "{:<24} {:<8} {:<10} {} {:>13}  {}",
            job.id,
            job.kind,
            job.status,
            progress,
            records,
            job.created_at.format("%Y-%m-%d %H:%M")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExportKind, ExportStatus};
    use chrono::{Duration, Utc};
    use serde_json::Value;

    fn jobs(n: usize) -> Vec<ExportJob> {
        let base = Utc::now();
        (0..n)
            .map(|i| {
                let mut job = ExportJob::new(format!("exp-{:03}", i), ExportKind::Hotel, Value::Null);
                job.created_at = base + Duration::seconds(i as i64);
                job
            })
            .collect()
    }

    #[test]
    fn test_sorted_newest_first() {
        let view = JobListView::new(jobs(3), DEFAULT_VIRTUALIZATION_THRESHOLD);
        let ids: Vec<_> = view.jobs().iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["exp-002", "exp-001", "exp-000"]);
    }

    #[test]
    fn test_small_list_renders_everything() {
        let view = JobListView::new(jobs(100), DEFAULT_VIRTUALIZATION_THRESHOLD);
        assert!(!view.is_virtualized());
        assert_eq!(view.window(10, 5).len(), 100);
    }

    #[test]
    fn test_large_list_renders_window() {
        let view = JobListView::new(jobs(101), DEFAULT_VIRTUALIZATION_THRESHOLD);
        assert!(view.is_virtualized());

        let window = view.window(10, 5);
        assert_eq!(window.len(), 5);
        assert_eq!(window[0].id, "exp-090");

        assert_eq!(view.window(99, 20).len(), 2);
        assert!(view.window(500, 20).is_empty());
    }

    #[test]
    fn test_clear_completed_label() {
        let mut list = jobs(3);
        assert!(JobListView::new(list.clone(), 100).clear_completed_label().is_none());

        list[0].status = ExportStatus::Completed;
        let view = JobListView::new(list, 100);
        assert_eq!(view.clear_completed_label().as_deref(), Some("Clear Completed (1)"));
        assert_eq!(view.processing_count(), 2);
    }

    #[test]
    fn test_format_row_hides_progress_when_done() {
        let mut job = jobs(1).remove(0);
        job.progress = 40.0;
        assert!(JobListView::format_row(&job).contains(" 40%"));

        job.status = ExportStatus::Completed;
        assert!(!JobListView::format_row(&job).contains('%'));
    }
}
