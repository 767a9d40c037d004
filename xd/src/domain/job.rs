//! ExportJob domain type
//!
//! Mirrors the record the backend returns from its create and status
//! endpoints. The filter payload is kept opaque.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Dataset an export produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    /// Hotel content export
    Hotel,
    /// Supplier mapping export
    Mapping,
}

impl ExportKind {
    /// Path segment and file-name prefix for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hotel => "hotel",
            Self::Mapping => "mapping",
        }
    }

    /// Human-readable label for notifications
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hotel => "Hotel",
            Self::Mapping => "Mapping",
        }
    }
}

impl std::fmt::Display for ExportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "ExportKind::from_str: called");
        match s.to_lowercase().as_str() {
            "hotel" | "hotels" => Ok(Self::Hotel),
            "mapping" | "mappings" => Ok(Self::Mapping),
            _ => Err(format!("Unknown export kind: '{}'. Supported: hotel, mapping", s)),
        }
    }
}

/// Export job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    /// Queued or running on the server
    #[default]
    #[serde(alias = "queued", alias = "pending", alias = "in_progress")]
    Processing,
    /// File is ready for download
    Completed,
    /// Server gave up on the export
    Failed,
    /// File was produced but is no longer downloadable
    Expired,
}

impl ExportStatus {
    /// True for completed, failed and expired
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl std::fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// An export job as known to this client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    /// Opaque server-assigned identifier
    pub id: String,

    /// Dataset being exported
    pub kind: ExportKind,

    /// Current status
    #[serde(default)]
    pub status: ExportStatus,

    /// Percent complete (0-100), only meaningful while processing
    #[serde(default)]
    pub progress: f64,

    /// Records written so far
    #[serde(default)]
    pub processed_records: u64,

    /// Records the export will contain
    #[serde(default)]
    pub total_records: u64,

    /// When the server accepted the export
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// When the produced file stops being downloadable
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Server-reported failure reason
    #[serde(default)]
    pub error: Option<String>,

    /// Download reference handed out once completed
    #[serde(default)]
    pub download_url: Option<String>,

    /// Filter configuration that produced this export
    #[serde(default)]
    pub filters: Value,
}

impl ExportJob {
    /// Create a freshly accepted job
    pub fn new(id: impl Into<String>, kind: ExportKind, filters: Value) -> Self {
        let id = id.into();
        debug!(%id, %kind, "ExportJob::new: called");
        Self {
            id,
            kind,
            status: ExportStatus::Processing,
            progress: 0.0,
            processed_records: 0,
            total_records: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            expires_at: None,
            error: None,
            download_url: None,
            filters,
        }
    }

    /// Reset a create-endpoint record to the state a new job starts in
    pub fn into_accepted(mut self) -> Self {
        debug!(id = %self.id, status = %self.status, "into_accepted: called");
        self.status = ExportStatus::Processing;
        self.progress = 0.0;
        self
    }

    pub fn is_processing(&self) -> bool {
        self.status == ExportStatus::Processing
    }

    /// Progress to display, None unless the job is still processing
    pub fn display_progress(&self) -> Option<f64> {
        self.is_processing().then_some(self.progress)
    }

    /// Apply a status-endpoint record to this job
    ///
    /// Identity, kind, filters and creation time are preserved. Start,
    /// completion and expiry timestamps are write-once.
    pub fn apply_update(&mut self, update: ExportJob) {
        debug!(id = %self.id, from = %self.status, to = %update.status, "apply_update: called");
        self.status = update.status;
        self.progress = clamp_progress(update.progress);
        self.processed_records = update.processed_records;
        self.total_records = update.total_records;

        if self.started_at.is_none() {
            self.started_at = update.started_at;
        }
        if self.completed_at.is_none() {
            self.completed_at = update.completed_at;
        }
        if self.expires_at.is_none() {
            self.expires_at = update.expires_at;
        }

        self.error = update.error;
        if update.download_url.is_some() {
            self.download_url = update.download_url;
        }
    }
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        return 0.0;
    }
    progress.clamp(0.0, 100.0)
}
