//! Streaming channel payloads.

use serde::{Deserialize, Deserializer};

/// A message on the server channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Informational alert; carries no state.
    Alert(ServerAlert),

    State(ServerState),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAlert {
    pub message: String,
}

/// Server-level fields of a studio.
///
/// Updates may be partial: an absent field leaves the current value alone,
/// while an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerState {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub status: Option<String>,
    #[serde(default, rename = "bannerURL", deserialize_with = "present")]
    pub banner_url: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub owner_id: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub sample_rate: Option<u32>,
    #[serde(default, deserialize_with = "present_flag")]
    pub broadcast: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub enabled: Option<bool>,
}

/// A message on the subscriptions channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionMessage {
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nickname: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub picture: String,
}

/// A message on the devices channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMessage {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner_id: String,
    /// Empty or absent when the device left the studio.
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_id: String,
    #[serde(default)]
    pub capture_mute: bool,
    #[serde(default)]
    pub capture_volume: f64,
}

impl DeviceMessage {
    /// Whether this message retires the device.
    pub fn is_retired(&self) -> bool {
        self.server_id.is_empty()
    }

    /// Capture volume as a percentage.
    pub fn volume_percent(&self) -> u8 {
        if self.capture_volume.is_nan() {
            return 0;
        }
        self.capture_volume.round().clamp(0.0, 100.0) as u8
    }
}

/// A tick on the meters channel. `clients` and `musicians` are index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetersMessage {
    #[serde(default)]
    pub clients: Vec<String>,
    /// Left/right levels in dBFS per client.
    #[serde(default)]
    pub musicians: Vec<Vec<f64>>,
}

impl MetersMessage {
    /// Left/right dB pair of the client at `index`, if complete.
    pub fn levels(&self, index: usize) -> Option<(f64, f64)> {
        match self.musicians.get(index)?.as_slice() {
            [left, right, ..] => Some((*left, *right)),
            _ => None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A field that is present in the payload. `null` maps to the default.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    null_as_default(deserializer).map(Some)
}

/// Accepts `true`/`false` as well as integers (non-zero is true).
fn present_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    Ok(Some(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
        Flag::Null(()) => false,
    }))
}
