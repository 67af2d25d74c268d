//! Common types used across IPC messages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire prefix of secondary-transport pseudo-device ids (`rtc-<user id>`).
pub const SECONDARY_DEVICE_PREFIX: &str = "rtc-";

/// Opaque identity of a studio participant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap a raw identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identity.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A transport-level audio endpoint.
///
/// Primary devices are minted by the server and announced on the devices
/// channel. Secondary devices are never announced; they are synthesized from
/// the active-participant poll and identify their owner directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceRef {
    /// Server-minted device id.
    Primary(String),

    /// Browser-transport pseudo-device owned by a participant.
    Secondary(ParticipantId),
}

impl DeviceRef {
    /// Interpret a device id as it appears on the wire.
    pub fn parse(wire: &str) -> Self {
        match wire.strip_prefix(SECONDARY_DEVICE_PREFIX) {
            Some(owner) if !owner.is_empty() => Self::Secondary(ParticipantId::from(owner)),
            _ => Self::Primary(wire.to_string()),
        }
    }

    /// Pseudo-device for a secondary-transport participant.
    pub fn secondary(owner: &ParticipantId) -> Self {
        Self::Secondary(owner.clone())
    }

    /// The id as the server spells it.
    pub fn wire_id(&self) -> String {
        match self {
            Self::Primary(id) => id.clone(),
            Self::Secondary(owner) => format!("{SECONDARY_DEVICE_PREFIX}{owner}"),
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Primary(_))
    }

    pub fn is_secondary(&self) -> bool {
        matches!(self, Self::Secondary(_))
    }

    /// Owner encoded in a secondary pseudo-device.
    pub fn secondary_owner(&self) -> Option<&ParticipantId> {
        match self {
            Self::Secondary(owner) => Some(owner),
            Self::Primary(_) => None,
        }
    }

    /// Server device id usable for device commands.
    pub fn primary_id(&self) -> Option<&str> {
        match self {
            Self::Primary(id) => Some(id),
            Self::Secondary(_) => None,
        }
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_id())
    }
}

/// The streaming channels a studio exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Server-level status (name, status, session id, ...).
    Server,

    /// Participant subscriptions.
    Subscriptions,

    /// Primary-transport devices.
    Devices,

    /// Live meter levels.
    Meters,
}

impl Channel {
    /// All channels, in startup order.
    pub const ALL: [Channel; 4] = [
        Channel::Server,
        Channel::Subscriptions,
        Channel::Devices,
        Channel::Meters,
    ];

    /// Returns the lowercase channel name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Subscriptions => "subscriptions",
            Self::Devices => "devices",
            Self::Meters => "meters",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a channel name is not recognised.
#[derive(Debug, Error)]
#[error("Unknown channel: {0}")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.name() == s)
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

/// Status of a streaming connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Handshake in progress.
    Connecting,

    /// Connected and receiving.
    Open,

    /// Could not be established (or reconnects exhausted).
    Failed { reason: String },

    /// Closed on request, or never opened.
    #[default]
    Closed,
}

impl ConnectionStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Get status message for UI.
    pub fn message(&self) -> String {
        match self {
            Self::Connecting => "Connecting...".to_string(),
            Self::Open => "Open".to_string(),
            Self::Failed { reason } => format!("Failed: {}", reason),
            Self::Closed => "Closed".to_string(),
        }
    }
}

/// Point-in-time view of one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub id: ParticipantId,
    pub name: String,
    /// Avatar image URL.
    pub picture: String,
    /// Device currently carrying this participant's audio.
    pub device: Option<DeviceRef>,
    pub muted: bool,
    /// Capture volume percentage (0-100).
    pub volume: u8,
    /// Linear left meter level.
    pub left_level: f32,
    /// Linear right meter level.
    pub right_level: f32,
}

impl ParticipantSnapshot {
    /// Whether the participant is currently in a live audio path.
    pub fn is_active(&self) -> bool {
        self.device.is_some()
    }
}

/// Per-channel receive counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub channel: Channel,
    pub messages: u64,
    pub decode_failures: u64,
    pub reconnects: u64,
    pub failures: u64,
    pub last_message_age_ms: Option<u64>,
}

/// A studio the user can open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudioSummary {
    pub id: String,
    pub name: String,
}

/// A finished recording stored for a studio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub id: String,
    pub name: String,
}
