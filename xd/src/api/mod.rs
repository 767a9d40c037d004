//! Export backend client
//!
//! Provides the ExportApi trait and its reqwest implementation.

pub mod client;
mod error;
mod http;

pub use client::{ExportApi, ExportDownload};
pub use error::ApiError;
pub use http::HttpExportApi;
