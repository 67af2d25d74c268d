//! Error types for the API client.

use thiserror::Error;

/// Errors that can occur talking to the studio API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be sent or its body not read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("Unexpected status {status} from {endpoint}")]
    Status { status: u16, endpoint: String },

    /// A URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Response body did not have the expected shape.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidUrl(e.to_string())
    }
}
