//! Error types for the engine.

use studio_api::ApiError;
use studio_ipc::{Channel, ParticipantId};
use studio_transport::TransportError;
use thiserror::Error;

/// Why a local mute/volume edit was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// No participant with this id is in the directory.
    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    /// The participant's audio path cannot be controlled remotely.
    #[error("Cannot control {id}: {reason}")]
    Unsupported { id: ParticipantId, reason: String },
}

/// Errors raised while running a session.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A payload could not be decoded.
    #[error("Malformed {channel} message: {source}")]
    Decode {
        channel: Channel,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
