//! Session state owned by the engine thread.
//!
//! [`StudioCore`] applies channel payloads, poll results and local edits to
//! the directory, device map and server fields. It performs no I/O: anything
//! that needs the network comes back as an [`Effect`] for the caller to run.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use studio_api::{DeviceUpdate, UserProfile};
use studio_ipc::{
    Channel, ChannelStats, DeviceRef, EventBus, ParticipantId, ServerFields, SessionField,
    SessionPhase, StudioConfig, StudioEvent, StudioSnapshot,
};
use tracing::{debug, info};

use crate::device_map::{DeviceMap, SecondaryDiff};
use crate::directory::Directory;
use crate::error::{ControlError, EngineError, EngineResult};

/// Work the core asks its caller to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open the meters channel and start polling active participants.
    StartLiveFeeds { session_id: String },

    /// Stop the meters channel and the poller.
    StopLiveFeeds,

    /// Look up a participant's profile.
    FetchOwner(ParticipantId),

    /// Download a participant's avatar. An empty URL means none is set.
    FetchAvatar { id: ParticipantId, url: String },

    /// Push capture settings of a primary device to the server.
    PushDevice {
        device_id: String,
        update: DeviceUpdate,
    },
}

pub struct StudioCore {
    pub(crate) ready_status: String,
    pub(crate) ignored_meter_devices: Vec<String>,
    pub(crate) bus: EventBus,
    pub(crate) directory: Directory,
    pub(crate) devices: DeviceMap,
    pub(crate) server: ServerFields,
    pub(crate) phase: SessionPhase,
}

impl StudioCore {
    pub fn new(config: &StudioConfig, bus: EventBus) -> Self {
        Self {
            ready_status: config.ready_status.clone(),
            ignored_meter_devices: config.ignored_meter_devices.clone(),
            directory: Directory::new(bus.clone()),
            bus,
            devices: DeviceMap::new(),
            server: ServerFields::default(),
            phase: SessionPhase::Idle,
        }
    }

    /// Open a session for a studio.
    pub fn begin(&mut self, server_id: &str) {
        self.devices.clear();
        self.directory.clear();
        self.server = ServerFields {
            server_id: server_id.to_string(),
            ..ServerFields::default()
        };
        self.transition_to(SessionPhase::Joined {
            server_id: server_id.to_string(),
        });
    }

    /// Drop all session state. Workers must already be stopped.
    pub fn end(&mut self) {
        self.devices.clear();
        self.directory.clear();
        self.server = ServerFields::default();
        self.transition_to(SessionPhase::Idle);
    }

    /// Apply one payload received on `channel`.
    ///
    /// Malformed payloads are returned as errors and leave state untouched.
    pub fn handle_message(&mut self, channel: Channel, text: &str) -> EngineResult<Vec<Effect>> {
        if self.phase.is_idle() {
            return Ok(Vec::new());
        }
        let effects = match channel {
            Channel::Server => {
                let message = decode(channel, text)?;
                self.on_server_message(message)
            }
            Channel::Subscriptions => {
                let message = decode(channel, text)?;
                self.on_subscription(message)
            }
            Channel::Devices => {
                let message = decode(channel, text)?;
                self.on_device(message)
            }
            Channel::Meters => {
                let message = decode(channel, text)?;
                self.on_meters(message)
            }
        };
        Ok(effects)
    }

    /// Reconcile secondary-transport devices with a poll of active users.
    pub fn apply_poll(&mut self, active: Vec<String>) -> SecondaryDiff {
        if !self.phase.is_live() {
            return SecondaryDiff::default();
        }
        let active: BTreeSet<ParticipantId> = active
            .into_iter()
            .filter(|id| !id.is_empty())
            .map(ParticipantId::from)
            .collect();
        let diff = self.devices.reconcile_secondary(&active);
        if !diff.is_empty() {
            debug!(added = ?diff.added, removed = ?diff.removed, "Secondary devices changed");
        }
        diff
    }

    /// Record a fetched profile, adding the participant if needed.
    pub fn apply_owner_profile(&mut self, profile: &UserProfile) -> Vec<Effect> {
        if self.phase.is_idle() || profile.user_id.is_empty() {
            return Vec::new();
        }
        let id = ParticipantId::from(profile.user_id.as_str());
        let name = match profile.display_name() {
            "" => profile.user_id.as_str(),
            name => name,
        };

        let previous_picture = self.directory.get(&id).map(|p| p.picture.clone());
        let changed = match previous_picture {
            None => self.directory.insert_if_absent(&id, name, &profile.picture),
            Some(_) => self.directory.set_profile(&id, name, &profile.picture),
        };

        if changed && previous_picture.as_deref() != Some(profile.picture.as_str()) {
            vec![Effect::FetchAvatar {
                id,
                url: profile.picture.clone(),
            }]
        } else {
            Vec::new()
        }
    }

    pub fn set_admin(&mut self, admin: bool) {
        if self.phase.is_idle() || self.server.admin == admin {
            return;
        }
        self.server.admin = admin;
        self.bus
            .publish(StudioEvent::SessionChanged(SessionField::Admin(admin)));
    }

    /// Local mute edit. Returns the device push to send.
    pub fn set_mute(&mut self, id: &ParticipantId, muted: bool) -> Result<Effect, ControlError> {
        let device_id = self.controllable_device(id)?;
        self.directory.set_mute(id, muted);
        Ok(self.push_device(id, device_id))
    }

    /// Local volume edit (0-100). Returns the device push to send.
    pub fn set_volume(&mut self, id: &ParticipantId, volume: u8) -> Result<Effect, ControlError> {
        let device_id = self.controllable_device(id)?;
        self.directory.set_volume(id, volume);
        Ok(self.push_device(id, device_id))
    }

    pub fn snapshot(&self, stats: Vec<ChannelStats>) -> StudioSnapshot {
        StudioSnapshot {
            phase: self.phase.clone(),
            server: self.server.clone(),
            participants: self.directory.snapshots(),
            stats,
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn server(&self) -> &ServerFields {
        &self.server
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn devices(&self) -> &DeviceMap {
        &self.devices
    }

    /// Start or stop live feeds to match the server fields.
    pub(crate) fn evaluate_live_feeds(&mut self) -> Vec<Effect> {
        let wanted = self.server.status == self.ready_status
            && self.server.enabled
            && !self.server.session_id.is_empty();
        let session_id = self.server.session_id.clone();

        match self.phase.clone() {
            SessionPhase::Joined { .. } if wanted => {
                self.start_live();
                vec![Effect::StartLiveFeeds { session_id }]
            }
            SessionPhase::Live { .. } if !wanted => {
                self.stop_live();
                vec![Effect::StopLiveFeeds]
            }
            SessionPhase::Live {
                session_id: current,
                ..
            } if current != session_id => {
                info!(from = %current, to = %session_id, "Session changed, restarting live feeds");
                self.stop_live();
                self.start_live();
                vec![Effect::StopLiveFeeds, Effect::StartLiveFeeds { session_id }]
            }
            _ => Vec::new(),
        }
    }

    fn start_live(&mut self) {
        self.devices.begin_live();
        self.transition_to(SessionPhase::Live {
            server_id: self.server.server_id.clone(),
            session_id: self.server.session_id.clone(),
        });
    }

    fn stop_live(&mut self) {
        self.devices.end_live();
        // Without meters nobody can be shown as transmitting.
        let ids: Vec<ParticipantId> = self.directory.ids().cloned().collect();
        for id in &ids {
            self.directory.set_device(id, None);
        }
        self.transition_to(SessionPhase::Joined {
            server_id: self.server.server_id.clone(),
        });
    }

    fn controllable_device(&self, id: &ParticipantId) -> Result<String, ControlError> {
        let participant = self
            .directory
            .get(id)
            .ok_or_else(|| ControlError::UnknownParticipant(id.clone()))?;

        let reason = match &participant.device {
            Some(DeviceRef::Primary(device_id)) => return Ok(device_id.clone()),
            Some(DeviceRef::Secondary(_)) => "browser participants cannot be controlled remotely",
            None => "participant has no active device",
        };

        self.bus.publish(StudioEvent::CommandRejected {
            id: id.clone(),
            reason: reason.to_string(),
        });
        Err(ControlError::Unsupported {
            id: id.clone(),
            reason: reason.to_string(),
        })
    }

    fn push_device(&self, id: &ParticipantId, device_id: String) -> Effect {
        let (muted, volume) = self
            .directory
            .get(id)
            .map(|p| (p.muted, p.volume))
            .unwrap_or_default();
        Effect::PushDevice {
            device_id,
            update: DeviceUpdate {
                server_id: self.server.server_id.clone(),
                capture_mute: muted,
                capture_volume: volume,
            },
        }
    }

    fn transition_to(&mut self, phase: SessionPhase) {
        if self.phase == phase {
            return;
        }
        let previous = std::mem::replace(&mut self.phase, phase.clone());
        debug!(
            previous = %previous.name(),
            current = %phase.name(),
            "State transition"
        );
        self.bus.publish(StudioEvent::StateChanged {
            previous: Box::new(previous),
            current: Box::new(phase),
        });
    }
}

fn decode<T: DeserializeOwned>(channel: Channel, text: &str) -> EngineResult<T> {
    serde_json::from_str(text).map_err(|source| EngineError::Decode { channel, source })
}
