//! Typed engine<->observer messages for the virtual studio client.
//!
//! This crate defines the message types exchanged between the sync engine
//! and whoever renders it, plus the shared identity and configuration types.

mod commands;
mod config;
mod events;
mod state;
mod subscription;
mod types;

pub use commands::StudioCommand;
pub use config::{ReconnectConfig, StudioConfig, MIN_POLL_INTERVAL};
pub use events::{ParticipantEvent, ParticipantEventKind, SessionField, StudioEvent};
pub use state::{ServerFields, SessionPhase, StudioSnapshot};
pub use subscription::{EventBus, ParticipantWatch};
pub use types::{
    Channel, ChannelStats, ConnectionStatus, DeviceRef, ParticipantId, ParticipantSnapshot,
    RecordingSummary, StudioSummary, UnknownChannel, SECONDARY_DEVICE_PREFIX,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (UI → Engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Default observer backlog before meter updates are skipped (Engine → UI).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<StudioCommand>, Receiver<StudioCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}
