//! REST payloads.

use serde::{Deserialize, Serialize};
use studio_ipc::{RecordingSummary, StudioSummary};

/// `GET /api/servers/{id}`, reduced to what the client uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub admin: bool,
}

/// `GET /api/users/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub display_name: Option<String>,
}

impl UserProfile {
    /// Display name if the user set one, else the nickname.
    pub fn display_name(&self) -> &str {
        self.user_metadata
            .as_ref()
            .and_then(|metadata| metadata.display_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.nickname)
    }
}

/// Body of `PUT /api/devices/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    pub server_id: String,
    pub capture_mute: bool,
    pub capture_volume: u8,
}

/// One entry of `GET /api/servers/{id}/participants`.
#[derive(Debug, Deserialize)]
pub(crate) struct ActiveParticipant {
    pub user_id: String,
}

/// One entry of `GET /api/servers` or `GET /api/servers/{id}/recordings`.
#[derive(Debug, Deserialize)]
pub(crate) struct Listing {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl From<Listing> for StudioSummary {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            name: listing.name,
        }
    }
}

impl From<Listing> for RecordingSummary {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            name: listing.name,
        }
    }
}

/// `GET /api/servers/{id}/recordings/{rid}/download`.
#[derive(Debug, Deserialize)]
pub(crate) struct DownloadLink {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_metadata() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"user_id":"u1","nickname":"nick","user_metadata":{"display_name":"Ada"}}"#,
        )
        .unwrap();
        assert_eq!(profile.display_name(), "Ada");
    }

    #[test]
    fn test_display_name_falls_back_to_nickname() {
        let empty: UserProfile = serde_json::from_str(
            r#"{"user_id":"u1","nickname":"nick","user_metadata":{"display_name":""}}"#,
        )
        .unwrap();
        assert_eq!(empty.display_name(), "nick");

        let missing: UserProfile =
            serde_json::from_str(r#"{"user_id":"u1","nickname":"nick"}"#).unwrap();
        assert_eq!(missing.display_name(), "nick");
    }

    #[test]
    fn test_device_update_wire_names() {
        let body = serde_json::to_value(DeviceUpdate {
            server_id: "srv".into(),
            capture_mute: true,
            capture_volume: 40,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"serverId": "srv", "captureMute": true, "captureVolume": 40})
        );
    }
}
