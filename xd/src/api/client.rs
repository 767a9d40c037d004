//! ExportApi trait definition

use async_trait::async_trait;
use serde_json::Value;

use super::ApiError;
use crate::domain::{ExportJob, ExportKind};

/// A downloaded export file
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDownload {
    /// Raw file contents
    pub bytes: Vec<u8>,

    /// File extension hint (csv, json, xlsx, ...)
    pub format: String,
}

/// Client for the export backend
///
/// Each call is a single request; retry policy lives with the callers.
#[async_trait]
pub trait ExportApi: Send + Sync {
    /// Ask the backend to start an export of `kind` with the given filters
    async fn create_export(&self, kind: ExportKind, filters: &Value) -> Result<ExportJob, ApiError>;

    /// Fetch the current server record for a job
    async fn export_status(&self, job_id: &str) -> Result<ExportJob, ApiError>;

    /// Fetch the produced file for a completed job
    async fn download_export(&self, job_id: &str) -> Result<ExportDownload, ApiError>;
}
