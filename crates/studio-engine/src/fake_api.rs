//! In-memory [`StudioApi`] for tests.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use studio_api::{ApiError, ApiResult, DeviceUpdate, ServerInfo, StudioApi, UserProfile};
use studio_ipc::{RecordingSummary, StudioSummary};

#[derive(Default)]
struct State {
    admin: bool,
    profiles: HashMap<String, UserProfile>,
    images: HashMap<String, Bytes>,
    image_delay: Option<Duration>,
    active: Vec<String>,
    studios: Vec<StudioSummary>,
    fail_pushes: bool,
    fail_catalog: bool,
    pushes: Vec<(String, DeviceUpdate)>,
    polls: usize,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<State>,
}

fn not_found(endpoint: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        endpoint: endpoint.to_string(),
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_admin(&self, admin: bool) {
        self.state.lock().admin = admin;
    }

    pub fn set_profile(&self, profile: UserProfile) {
        self.state
            .lock()
            .profiles
            .insert(profile.user_id.clone(), profile);
    }

    pub fn set_image(&self, url: &str, image: &'static [u8]) {
        self.state
            .lock()
            .images
            .insert(url.to_string(), Bytes::from_static(image));
    }

    /// Make every image download take `delay`.
    pub fn delay_images(&self, delay: Duration) {
        self.state.lock().image_delay = Some(delay);
    }

    pub fn set_active(&self, ids: &[&str]) {
        self.state.lock().active = ids.iter().map(|id| id.to_string()).collect();
    }

    pub fn set_studios(&self, studios: Vec<StudioSummary>) {
        self.state.lock().studios = studios;
    }

    pub fn fail_pushes(&self) {
        self.state.lock().fail_pushes = true;
    }

    pub fn fail_catalog(&self) {
        self.state.lock().fail_catalog = true;
    }

    pub fn pushes(&self) -> Vec<(String, DeviceUpdate)> {
        self.state.lock().pushes.clone()
    }

    pub fn polls(&self) -> usize {
        self.state.lock().polls
    }
}

impl StudioApi for FakeApi {
    fn server_info(&self, _token: &str, _server_id: &str) -> ApiResult<ServerInfo> {
        Ok(ServerInfo {
            admin: self.state.lock().admin,
        })
    }

    fn user_profile(&self, _token: &str, user_id: &str) -> ApiResult<UserProfile> {
        self.state
            .lock()
            .profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| not_found(&format!("/api/users/{user_id}")))
    }

    fn active_participants(&self, _token: &str, _server_id: &str) -> ApiResult<Vec<String>> {
        let mut state = self.state.lock();
        state.polls += 1;
        Ok(state.active.clone())
    }

    fn update_device(&self, _token: &str, device_id: &str, update: &DeviceUpdate) -> ApiResult<()> {
        let mut state = self.state.lock();
        state.pushes.push((device_id.to_string(), update.clone()));
        if state.fail_pushes {
            return Err(ApiError::Status {
                status: 500,
                endpoint: format!("/api/devices/{device_id}"),
            });
        }
        Ok(())
    }

    fn fetch_bytes(&self, url: &str) -> ApiResult<Bytes> {
        let delay = self.state.lock().image_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.state
            .lock()
            .images
            .get(url)
            .cloned()
            .ok_or_else(|| not_found(url))
    }

    fn list_servers(&self, _token: &str) -> ApiResult<Vec<StudioSummary>> {
        let state = self.state.lock();
        if state.fail_catalog {
            return Err(not_found("/api/servers"));
        }
        Ok(state.studios.clone())
    }

    fn list_recordings(&self, _token: &str, server_id: &str) -> ApiResult<Vec<RecordingSummary>> {
        if self.state.lock().fail_catalog {
            return Err(not_found(&format!("/api/servers/{server_id}/recordings")));
        }
        Ok(vec![RecordingSummary {
            id: "rec1".into(),
            name: "Take one".into(),
        }])
    }

    fn recording_download_url(
        &self,
        _token: &str,
        server_id: &str,
        recording_id: &str,
    ) -> ApiResult<String> {
        Ok(format!(
            "https://files.test/{server_id}/{recording_id}-2024.zip?sig=abc"
        ))
    }
}
