//! HTTP implementation of the export API
//!
//! Endpoints:
//! - `POST {base}/api/exports/{kind}` with the filter payload as body
//! - `GET {base}/api/exports/{id}/status`
//! - `GET {base}/api/exports/{id}/download`

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ApiError, ExportApi, ExportDownload};
use crate::config::ApiConfig;
use crate::domain::{ExportJob, ExportKind};

/// Header the backend uses to name the download format
const FORMAT_HEADER: &str = "x-export-format";

/// Fallback when neither header nor content type identify the format
const DEFAULT_FORMAT: &str = "csv";

/// reqwest-backed export API client
pub struct HttpExportApi {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl HttpExportApi {
    /// Create a client against `base_url`
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(%base_url, has_token = token.is_some(), ?timeout, "HttpExportApi::new: called");
        let http = Client::builder().timeout(timeout).build().map_err(ApiError::Network)?;
        Ok(Self { base_url, token, http })
    }

    /// Create a client from configuration
    ///
    /// The bearer token is read from the environment variable named in config.
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        debug!(?config, "from_config: called");
        Self::new(&config.base_url, config.token(), config.timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("x-request-id", Uuid::now_v7().to_string());
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn non-2xx responses into errors, mapping 404 to NotFound
    async fn check(response: Response, job_id: Option<&str>) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if let Some(id) = job_id.filter(|_| status == reqwest::StatusCode::NOT_FOUND) {
            debug!(%id, "check: job not found");
            return Err(ApiError::NotFound(id.to_string()));
        }

        let message = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), %message, "check: export API returned an error");
        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn parse_job(response: Response) -> Result<ExportJob, ApiError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(format!("export record: {}", e)))
    }
}

#[async_trait]
impl ExportApi for HttpExportApi {
    async fn create_export(&self, kind: ExportKind, filters: &Value) -> Result<ExportJob, ApiError> {
        debug!(%kind, "HttpExportApi::create_export: called");
        let url = self.url(&format!("/api/exports/{}", kind.as_str()));
        let response = self.authorize(self.http.post(&url)).json(filters).send().await?;
        let response = Self::check(response, None).await?;
        let job = Self::parse_job(response).await?;
        debug!(id = %job.id, "HttpExportApi::create_export: accepted");
        Ok(job)
    }

    async fn export_status(&self, job_id: &str) -> Result<ExportJob, ApiError> {
        debug!(%job_id, "HttpExportApi::export_status: called");
        let url = self.url(&format!("/api/exports/{}/status", job_id));
        let response = self.authorize(self.http.get(&url)).send().await?;
        let response = Self::check(response, Some(job_id)).await?;
        Self::parse_job(response).await
    }

    async fn download_export(&self, job_id: &str) -> Result<ExportDownload, ApiError> {
        debug!(%job_id, "HttpExportApi::download_export: called");
        let url = self.url(&format!("/api/exports/{}/download", job_id));
        let response = self.authorize(self.http.get(&url)).send().await?;
        let response = Self::check(response, Some(job_id)).await?;
        let format = format_hint(response.headers());
        let bytes = response.bytes().await?.to_vec();
        debug!(%job_id, %format, size = bytes.len(), "HttpExportApi::download_export: received");
        Ok(ExportDownload { bytes, format })
    }
}

/// Work out the file extension for a download
fn format_hint(headers: &HeaderMap) -> String {
    if let Some(format) = headers.get(FORMAT_HEADER).and_then(|v| v.to_str().ok()) {
        let format = format.trim().trim_start_matches('.').to_lowercase();
        // Becomes a file extension
        if !format.is_empty() && format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return format;
        }
        warn!(%format, "format_hint: ignoring unusable format header");
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();

    let format = if content_type.contains("csv") {
        "csv"
    } else if content_type.contains("json") {
        "json"
    } else if content_type.contains("spreadsheetml") || content_type.contains("ms-excel") {
        "xlsx"
    } else if content_type.contains("zip") {
        "zip"
    } else {
        DEFAULT_FORMAT
    };
    format.to_string()
}
