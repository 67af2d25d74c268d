//! Commands sent from the UI to the engine.

use serde::{Deserialize, Serialize};

use crate::types::ParticipantId;

/// Commands that the UI can send to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StudioCommand {
    /// Open the panel for a studio. Empty fields close the current one.
    Show { server_id: String, token: String },

    /// Close the panel and end the session.
    Hide,

    /// Mute or unmute a participant's capture.
    SetMute { id: ParticipantId, muted: bool },

    /// Set a participant's capture volume (0-100).
    SetVolume { id: ParticipantId, volume: u8 },

    /// Request a full state snapshot.
    GetSnapshot,

    /// Request per-channel statistics.
    GetStats,

    /// Request the studios visible to a user.
    ListStudios { token: String },

    /// Request the recordings of a studio.
    ListRecordings { server_id: String, token: String },

    /// Resolve the download link for a recording.
    ResolveRecording {
        server_id: String,
        recording_id: String,
        token: String,
    },

    /// Shutdown the engine completely.
    Shutdown,
}
