//! Domain types for export jobs
//!
//! - ExportJob: a server-side export task tracked client-side by id and status
//! - ExportKind: which dataset the export produces
//! - ExportStatus: lifecycle state reported by the backend

mod job;

pub use job::{ExportJob, ExportKind, ExportStatus};
