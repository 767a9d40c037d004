//! Job store messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::api::ApiError;
use crate::domain::ExportJob;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Export API error: {0}")]
    Api(#[from] ApiError),

    #[error("Channel error")]
    ChannelError,
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Api(e) => e.is_retryable(),
            StoreError::ChannelError => false,
        }
    }
}

/// Response from store operations
pub type StoreResponse<T> = Result<T, StoreError>;

/// Event broadcast after every effective mutation
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// The job list changed; carries the post-mutation snapshot
    JobsChanged { jobs: Vec<ExportJob> },
}

/// Commands sent to the JobStore actor
#[derive(Debug)]
pub enum StoreCommand {
    /// Append a newly accepted job
    Insert {
        job: ExportJob,
        reply: oneshot::Sender<()>,
    },
    /// Replace the mutable fields of a known job; replies false if unknown
    ApplyUpdate {
        update: ExportJob,
        reply: oneshot::Sender<bool>,
    },
    /// Remove one job; replies false if it was not present
    Delete {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    /// Remove every terminal job; replies with the number removed
    ClearCompleted { reply: oneshot::Sender<usize> },
    List {
        reply: oneshot::Sender<Vec<ExportJob>>,
    },
    Get {
        id: String,
        reply: oneshot::Sender<Option<ExportJob>>,
    },

    // Shutdown
    Shutdown,
}
