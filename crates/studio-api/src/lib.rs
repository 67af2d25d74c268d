//! REST client and endpoint helpers for the virtual studio service.
//!
//! [`StudioApi`] is the seam the engine talks through; [`ApiClient`] is the
//! HTTP implementation.

mod client;
mod endpoints;
mod error;
mod types;

pub use client::{ApiClient, StudioApi};
pub use endpoints::{join_url, meters_auth_code, meters_url, stream_url};
pub use error::ApiError;
pub use types::{DeviceUpdate, ServerInfo, UserMetadata, UserProfile};

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
