//! Sync engine for the virtual studio client.
//!
//! This crate merges the studio's streaming channels and the active-participant
//! poll into one participant directory, and drives the connections that feed it.

mod avatars;
mod device_map;
mod directory;
mod error;
mod interpreters;
mod orchestrator;
mod poller;
mod rest_worker;
mod session;
mod state;
mod stats;
mod wire;

#[cfg(test)]
mod fake_api;

pub use avatars::AvatarCache;
pub use device_map::{DeviceMap, SecondaryDiff};
pub use directory::Directory;
pub use error::{ControlError, EngineError, EngineResult};
pub use interpreters::db_to_linear;
pub use orchestrator::Engine;
pub use state::{Effect, StudioCore};
pub use stats::StatsCollector;

use std::sync::Arc;

use crossbeam_channel::Receiver;
use studio_api::StudioApi;
use studio_ipc::{EventBus, StudioCommand, StudioConfig};

/// Create an engine instance wired to a command channel and an event bus.
pub fn create_engine(
    config: StudioConfig,
    api: Arc<dyn StudioApi>,
    command_rx: Receiver<StudioCommand>,
    bus: EventBus,
) -> EngineResult<Engine> {
    Engine::new(config, api, command_rx, bus)
}
