//! Retry budget tracking
//!
//! Counts attempts per (operation type, operation id). Callers increment
//! before each retry and reset on confirmed success; once the count reaches
//! the cap the operation is terminally failed. Counts live only as long as
//! the tracker does.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::domain::ExportKind;

/// Default number of retries allowed per operation
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Kind of operation being retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Refresh,
    Download,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Refresh => write!(f, "refresh"),
            Self::Download => write!(f, "download"),
        }
    }
}

/// A retryable operation with everything needed to run it again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Create { kind: ExportKind, filters: Value },
    Refresh { job_id: String },
    Download { job_id: String },
}

impl Operation {
    pub fn op_type(&self) -> OperationType {
        match self {
            Self::Create { .. } => OperationType::Create,
            Self::Refresh { .. } => OperationType::Refresh,
            Self::Download { .. } => OperationType::Download,
        }
    }

    /// Operation-specific identifier: the job id, or the serialized
    /// payload for creates
    pub fn op_id(&self) -> String {
        match self {
            Self::Create { kind, filters } => format!("{}:{}", kind, filters),
            Self::Refresh { job_id } | Self::Download { job_id } => job_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RetryKey {
    op: OperationType,
    id: String,
}

impl RetryKey {
    fn new(op: OperationType, id: &str) -> Self {
        Self { op, id: id.to_string() }
    }
}

/// Per-operation attempt counter with a fixed cap
#[derive(Debug)]
pub struct RetryTracker {
    max_retries: u32,
    counts: Mutex<HashMap<RetryKey, u32>>,
}

impl Default for RetryTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryTracker {
    pub fn new(max_retries: u32) -> Self {
        debug!(max_retries, "RetryTracker::new: called");
        Self {
            max_retries,
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn counts(&self) -> std::sync::MutexGuard<'_, HashMap<RetryKey, u32>> {
        // A panic while holding the lock cannot leave a count half-written
        self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attempts recorded so far (0 for an unknown key)
    pub fn retry_count(&self, op: OperationType, id: &str) -> u32 {
        self.counts().get(&RetryKey::new(op, id)).copied().unwrap_or(0)
    }

    /// True while the attempt count is below the cap
    pub fn can_retry(&self, op: OperationType, id: &str) -> bool {
        self.retry_count(op, id) < self.max_retries
    }

    /// Record one more attempt, saturating at the cap; returns the new count
    pub fn increment_retry(&self, op: OperationType, id: &str) -> u32 {
        let mut counts = self.counts();
        let count = counts.entry(RetryKey::new(op, id)).or_insert(0);
        *count = (*count + 1).min(self.max_retries);
        debug!(%op, %id, count = *count, "increment_retry: recorded attempt");
        *count
    }

    /// Forget the record after a confirmed success
    pub fn reset_retry(&self, op: OperationType, id: &str) {
        if self.counts().remove(&RetryKey::new(op, id)).is_some() {
            debug!(%op, %id, "reset_retry: cleared");
        }
    }

    /// Use up the whole budget at once, for failures a retry cannot fix
    pub fn exhaust(&self, op: OperationType, id: &str) {
        debug!(%op, %id, "exhaust: called");
        self.counts().insert(RetryKey::new(op, id), self.max_retries);
    }

    /// Drop the records of `op` whose id fails `keep`
    pub fn retain(&self, op: OperationType, keep: impl Fn(&str) -> bool) {
        self.counts().retain(|key, _| key.op != op || keep(&key.id));
    }

    /// Number of operations with a live record
    pub fn tracked(&self) -> usize {
        self.counts().len()
    }

    pub fn retry_count_for(&self, operation: &Operation) -> u32 {
        self.retry_count(operation.op_type(), &operation.op_id())
    }

    pub fn can_retry_op(&self, operation: &Operation) -> bool {
        self.can_retry(operation.op_type(), &operation.op_id())
    }

    pub fn increment_op(&self, operation: &Operation) -> u32 {
        self.increment_retry(operation.op_type(), &operation.op_id())
    }

    pub fn reset_op(&self, operation: &Operation) {
        self.reset_retry(operation.op_type(), &operation.op_id())
    }
}
