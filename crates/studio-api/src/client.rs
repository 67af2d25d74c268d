//! HTTP client for the studio REST API.

use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use studio_ipc::{RecordingSummary, StudioConfig, StudioSummary};
use tracing::{debug, instrument};
use url::Url;

use crate::error::ApiError;
use crate::types::{ActiveParticipant, DeviceUpdate, DownloadLink, Listing, ServerInfo, UserProfile};
use crate::ApiResult;

/// Operations the client needs from the studio service.
///
/// Calls block; run them off the UI thread.
pub trait StudioApi: Send + Sync {
    /// `GET /api/servers/{id}`.
    fn server_info(&self, token: &str, server_id: &str) -> ApiResult<ServerInfo>;

    /// `GET /api/users/{id}`.
    fn user_profile(&self, token: &str, user_id: &str) -> ApiResult<UserProfile>;

    /// Users currently connected through the browser transport.
    fn active_participants(&self, token: &str, server_id: &str) -> ApiResult<Vec<String>>;

    /// Push capture mute/volume for a primary device.
    fn update_device(&self, token: &str, device_id: &str, update: &DeviceUpdate) -> ApiResult<()>;

    /// Unauthenticated download, used for avatars.
    fn fetch_bytes(&self, url: &str) -> ApiResult<Bytes>;

    fn list_servers(&self, token: &str) -> ApiResult<Vec<StudioSummary>>;

    fn list_recordings(&self, token: &str, server_id: &str) -> ApiResult<Vec<RecordingSummary>>;

    /// Signed download link for a recording archive.
    fn recording_download_url(
        &self,
        token: &str,
        server_id: &str,
        recording_id: &str,
    ) -> ApiResult<String>;
}

/// Blocking REST client with bearer authentication.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    /// Create a client for the API rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("studio-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base })
    }

    pub fn from_config(config: &StudioConfig) -> ApiResult<Self> {
        Self::new(&config.api_base_url(), config.http_timeout())
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(&self, token: &str, url: Url) -> ApiResult<T> {
        debug!(path = url.path(), "GET");
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()?;
        check_status(response)?
            .json::<T>()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(ApiError::Status {
        status: status.as_u16(),
        endpoint: response.url().path().to_string(),
    })
}

impl StudioApi for ApiClient {
    fn server_info(&self, token: &str, server_id: &str) -> ApiResult<ServerInfo> {
        self.get_json(token, self.endpoint(&["api", "servers", server_id])?)
    }

    fn user_profile(&self, token: &str, user_id: &str) -> ApiResult<UserProfile> {
        self.get_json(token, self.endpoint(&["api", "users", user_id])?)
    }

    fn active_participants(&self, token: &str, server_id: &str) -> ApiResult<Vec<String>> {
        let url = self.endpoint(&["api", "servers", server_id, "participants"])?;
        let participants: Vec<ActiveParticipant> = self.get_json(token, url)?;
        Ok(participants.into_iter().map(|p| p.user_id).collect())
    }

    #[instrument(skip(self, token, update))]
    fn update_device(&self, token: &str, device_id: &str, update: &DeviceUpdate) -> ApiResult<()> {
        let url = self.endpoint(&["api", "devices", device_id])?;
        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .json(update)
            .send()?;
        check_status(response)?;
        Ok(())
    }

    fn fetch_bytes(&self, url: &str) -> ApiResult<Bytes> {
        let url = Url::parse(url)?;
        let response = self.http.get(url).send()?;
        Ok(check_status(response)?.bytes()?)
    }

    fn list_servers(&self, token: &str) -> ApiResult<Vec<StudioSummary>> {
        let listings: Vec<Listing> = self.get_json(token, self.endpoint(&["api", "servers"])?)?;
        Ok(listings.into_iter().map(StudioSummary::from).collect())
    }

    fn list_recordings(&self, token: &str, server_id: &str) -> ApiResult<Vec<RecordingSummary>> {
        let url = self.endpoint(&["api", "servers", server_id, "recordings"])?;
        let listings: Vec<Listing> = self.get_json(token, url)?;
        Ok(listings.into_iter().map(RecordingSummary::from).collect())
    }

    fn recording_download_url(
        &self,
        token: &str,
        server_id: &str,
        recording_id: &str,
    ) -> ApiResult<String> {
        let url = self.endpoint(&[
            "api",
            "servers",
            server_id,
            "recordings",
            recording_id,
            "download",
        ])?;
        let link: DownloadLink = self.get_json(token, url)?;
        if link.url.is_empty() {
            return Err(ApiError::Decode("empty download link".to_string()));
        }
        Ok(link.url)
    }
}
