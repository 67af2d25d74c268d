//! Events sent from the engine to observers.

use serde::{Deserialize, Serialize};

use crate::state::{SessionPhase, StudioSnapshot};
use crate::types::{
    Channel, ChannelStats, ConnectionStatus, ParticipantId, RecordingSummary, StudioSummary,
};

/// A change to one participant, or to the directory as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParticipantEvent {
    /// New live meter levels (linear amplitude).
    MeterChanged {
        id: ParticipantId,
        left: f32,
        right: f32,
    },

    /// Capture volume changed.
    VolumeChanged { id: ParticipantId, volume: u8 },

    /// Mute flag changed.
    MuteChanged { id: ParticipantId, muted: bool },

    /// Participant entered a live audio path.
    Shown { id: ParticipantId },

    /// Participant left every live audio path.
    Hidden { id: ParticipantId },

    /// Directory composition or a participant's profile changed.
    DirectoryRefreshed,
}

/// Discriminant of [`ParticipantEvent`], for listeners filtering by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantEventKind {
    Meter,
    Volume,
    Mute,
    Shown,
    Hidden,
    Refresh,
}

impl ParticipantEvent {
    /// The participant this event concerns, if any.
    pub fn participant(&self) -> Option<&ParticipantId> {
        match self {
            Self::MeterChanged { id, .. }
            | Self::VolumeChanged { id, .. }
            | Self::MuteChanged { id, .. }
            | Self::Shown { id }
            | Self::Hidden { id } => Some(id),
            Self::DirectoryRefreshed => None,
        }
    }

    pub fn kind(&self) -> ParticipantEventKind {
        match self {
            Self::MeterChanged { .. } => ParticipantEventKind::Meter,
            Self::VolumeChanged { .. } => ParticipantEventKind::Volume,
            Self::MuteChanged { .. } => ParticipantEventKind::Mute,
            Self::Shown { .. } => ParticipantEventKind::Shown,
            Self::Hidden { .. } => ParticipantEventKind::Hidden,
            Self::DirectoryRefreshed => ParticipantEventKind::Refresh,
        }
    }
}

/// A server-reported session field that changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionField {
    Name(String),
    Status(String),
    Banner(String),
    SessionId(String),
    OwnerId(String),
    SampleRate(u32),
    Broadcast(bool),
    Enabled(bool),
    Admin(bool),
}

/// Events that the engine can send to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StudioEvent {
    /// Session phase has changed.
    StateChanged {
        previous: Box<SessionPhase>,
        current: Box<SessionPhase>,
    },

    /// A server-level field changed.
    SessionChanged(SessionField),

    /// Participant directory change.
    Participant(ParticipantEvent),

    /// Avatar image for a participant is cached.
    AvatarReady {
        id: ParticipantId,
        /// True when the default avatar stands in for a failed fetch.
        fallback: bool,
    },

    /// A streaming channel changed status.
    Connection {
        channel: Channel,
        status: ConnectionStatus,
    },

    /// A local edit was refused before reaching the server.
    CommandRejected { id: ParticipantId, reason: String },

    /// Per-channel counters.
    Stats(Vec<ChannelStats>),

    /// Full state dump, on request.
    Snapshot(Box<StudioSnapshot>),

    /// Studios visible to the user.
    Studios(Vec<StudioSummary>),

    /// Recordings stored for a studio.
    Recordings {
        server_id: String,
        recordings: Vec<RecordingSummary>,
    },

    /// Resolved download link for a recording.
    RecordingUrl { recording_id: String, url: String },

    /// Error occurred.
    Error {
        /// Whether the error is recoverable.
        recoverable: bool,

        /// Error message.
        message: String,
    },

    /// Engine is ready.
    Ready,

    /// Engine has shut down.
    Shutdown,
}

impl From<ParticipantEvent> for StudioEvent {
    fn from(event: ParticipantEvent) -> Self {
        Self::Participant(event)
    }
}
