//! Error types for the recording pipeline.

use studio_api::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The download link does not name a file.
    #[error("Invalid download URL: {0}")]
    InvalidUrl(String),

    /// A recording id that is not a single path component.
    #[error("Invalid recording name: {0}")]
    InvalidName(String),

    /// The queue was closed; no more segments are accepted.
    #[error("Segment queue is closed")]
    QueueClosed,
}

pub type RecordingResult<T> = Result<T, RecordingError>;
