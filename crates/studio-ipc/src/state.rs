//! Session state machine types.

use serde::{Deserialize, Serialize};

use crate::types::{ChannelStats, ParticipantSnapshot};

/// Lifecycle phase of the studio session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No studio open.
    #[default]
    Idle,

    /// Base channels (server, subscriptions, devices) are running.
    Joined { server_id: String },

    /// The studio is ready; meters and the participant poller run too.
    Live {
        server_id: String,
        session_id: String,
    },
}

impl SessionPhase {
    /// Returns true if no studio is open.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if live feeds are running.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    /// Server id of the open studio.
    pub fn server_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Joined { server_id } | Self::Live { server_id, .. } => Some(server_id),
        }
    }

    /// Returns a simple string representation of the phase.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Joined { .. } => "Joined",
            Self::Live { .. } => "Live",
        }
    }
}

/// Server-reported fields of the open studio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerFields {
    pub server_id: String,
    pub name: String,
    pub status: String,
    pub banner: String,
    pub session_id: String,
    pub owner_id: String,
    pub sample_rate: u32,
    pub broadcast: bool,
    pub enabled: bool,
    pub admin: bool,
}

/// Full state dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudioSnapshot {
    pub phase: SessionPhase,
    pub server: ServerFields,
    /// Participants in identity order.
    pub participants: Vec<ParticipantSnapshot>,
    pub stats: Vec<ChannelStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_server_id() {
        assert_eq!(SessionPhase::Idle.server_id(), None);
        let live = SessionPhase::Live {
            server_id: "srv".into(),
            session_id: "s1".into(),
        };
        assert_eq!(live.server_id(), Some("srv"));
        assert!(live.is_live());
        assert_eq!(live.name(), "Live");
    }
}
