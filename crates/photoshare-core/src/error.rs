use thiserror::Error;

use crate::types::PhotoId;
use crate::workflow::Phase;

/// Classified failure of a remote call. The gateway never retries; callers decide.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("rejected by server: {detail}")]
    ValidationRejected { detail: String },
    #[error("not found")]
    NotFound,
    #[error("server unavailable")]
    ServerUnavailable,
    #[error("network unreachable")]
    NetworkUnreachable,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("select between 3 and 5 face photos (got {count})")]
    InvalidSampleCount { count: usize },
    #[error("no photos selected")]
    EmptySelection,
    #[error("no face samples selected")]
    NoSamplesSelected,
    #[error("another run of this workflow is still in progress")]
    Busy,
    #[error("not signed in")]
    NotSignedIn,
    #[error("workflow cannot move from {from} to {to}")]
    IllegalTransition { from: Phase, to: Phase },
    #[error("invalid registration: {0}")]
    InvalidRegistration(&'static str),
    /// Phase 1 stored the photos but the processing trigger failed.
    #[error("{} photo(s) uploaded but processing failed: {source}", .uploaded.len())]
    ProcessingIncomplete {
        uploaded: Vec<PhotoId>,
        source: ApiError,
    },
    #[error("session storage: {0}")]
    Storage(String),
    #[error(transparent)]
    Remote(#[from] ApiError),
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl WorkflowError {
    /// True for errors raised by local validation, before any network call.
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            Self::Remote(_) | Self::ProcessingIncomplete { .. } | Self::Storage(_)
        )
    }
}

/// Durable key-value storage failure.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] ApiError),
    #[error("could not write {}: {source}", .path.display())]
    Write {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
