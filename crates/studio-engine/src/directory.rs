//! Participant directory.
//!
//! The authoritative map of who is in the studio. Every mutation that changes
//! state publishes exactly one [`ParticipantEvent`]; mutations that change
//! nothing publish nothing.

use std::collections::BTreeMap;

use studio_ipc::{DeviceRef, EventBus, ParticipantEvent, ParticipantId, ParticipantSnapshot};
use tracing::trace;

pub struct Directory {
    participants: BTreeMap<ParticipantId, ParticipantSnapshot>,
    bus: EventBus,
}

impl Directory {
    pub fn new(bus: EventBus) -> Self {
        Self {
            participants: BTreeMap::new(),
            bus,
        }
    }

    /// Add a participant unless one with this id exists. Returns true if added.
    pub fn insert_if_absent(&mut self, id: &ParticipantId, name: &str, picture: &str) -> bool {
        if self.participants.contains_key(id) {
            return false;
        }
        trace!(%id, "Participant added");
        self.participants.insert(
            id.clone(),
            ParticipantSnapshot {
                id: id.clone(),
                name: name.to_string(),
                picture: picture.to_string(),
                device: None,
                muted: false,
                volume: 100,
                left_level: 0.0,
                right_level: 0.0,
            },
        );
        self.publish(ParticipantEvent::DirectoryRefreshed);
        true
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&ParticipantSnapshot> {
        self.participants.get(id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.participants.contains_key(id)
    }

    pub fn set_mute(&mut self, id: &ParticipantId, muted: bool) -> bool {
        let Some(participant) = self.participants.get_mut(id) else {
            return false;
        };
        if participant.muted == muted {
            return false;
        }
        participant.muted = muted;
        self.publish(ParticipantEvent::MuteChanged {
            id: id.clone(),
            muted,
        });
        true
    }

    /// Set capture volume, clamped to 0-100.
    pub fn set_volume(&mut self, id: &ParticipantId, volume: u8) -> bool {
        let volume = volume.min(100);
        let Some(participant) = self.participants.get_mut(id) else {
            return false;
        };
        if participant.volume == volume {
            return false;
        }
        participant.volume = volume;
        self.publish(ParticipantEvent::VolumeChanged {
            id: id.clone(),
            volume,
        });
        true
    }

    /// Set or clear the device carrying a participant's audio.
    ///
    /// Only a change of activity (none ↔ some) is published; moving between
    /// two devices is silent.
    pub fn set_device(&mut self, id: &ParticipantId, device: Option<DeviceRef>) -> bool {
        let Some(participant) = self.participants.get_mut(id) else {
            return false;
        };
        if participant.device == device {
            return false;
        }
        let was_active = participant.is_active();
        participant.device = device;
        let event = match (was_active, participant.is_active()) {
            (false, true) => Some(ParticipantEvent::Shown { id: id.clone() }),
            (true, false) => Some(ParticipantEvent::Hidden { id: id.clone() }),
            _ => None,
        };
        if let Some(event) = event {
            self.publish(event);
        }
        true
    }

    /// Record linear meter levels.
    pub fn set_meter(&mut self, id: &ParticipantId, left: f32, right: f32) -> bool {
        let Some(participant) = self.participants.get_mut(id) else {
            return false;
        };
        if participant.left_level == left && participant.right_level == right {
            return false;
        }
        participant.left_level = left;
        participant.right_level = right;
        self.publish(ParticipantEvent::MeterChanged {
            id: id.clone(),
            left,
            right,
        });
        true
    }

    /// Update display name and avatar reference.
    pub fn set_profile(&mut self, id: &ParticipantId, name: &str, picture: &str) -> bool {
        let Some(participant) = self.participants.get_mut(id) else {
            return false;
        };
        if participant.name == name && participant.picture == picture {
            return false;
        }
        participant.name = name.to_string();
        participant.picture = picture.to_string();
        self.publish(ParticipantEvent::DirectoryRefreshed);
        true
    }

    /// Remove everyone.
    pub fn clear(&mut self) {
        if self.participants.is_empty() {
            return;
        }
        self.participants.clear();
        self.publish(ParticipantEvent::DirectoryRefreshed);
    }

    /// Participant ids in layout order.
    pub fn ids(&self) -> impl Iterator<Item = &ParticipantId> {
        self.participants.keys()
    }

    pub fn snapshots(&self) -> Vec<ParticipantSnapshot> {
        self.participants.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    fn publish(&self, event: ParticipantEvent) {
        self.bus.publish(event.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver;
    use studio_ipc::StudioEvent;

    fn directory() -> (Directory, Receiver<StudioEvent>) {
        let bus = EventBus::new(64);
        let rx = bus.subscribe();
        (Directory::new(bus), rx)
    }

    fn drain(rx: &Receiver<StudioEvent>) -> Vec<ParticipantEvent> {
        rx.try_iter()
            .filter_map(|event| match event {
                StudioEvent::Participant(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_insert_is_idempotent() {
        let (mut directory, rx) = directory();
        let id = ParticipantId::from("u1");

        assert!(directory.insert_if_absent(&id, "Ada", ""));
        assert!(!directory.insert_if_absent(&id, "Other", ""));

        assert_eq!(directory.get(&id).unwrap().name, "Ada");
        assert_eq!(drain(&rx), vec![ParticipantEvent::DirectoryRefreshed]);
    }

    #[test]
    fn test_unchanged_values_publish_nothing() {
        let (mut directory, rx) = directory();
        let id = ParticipantId::from("u1");
        directory.insert_if_absent(&id, "Ada", "");
        drain(&rx);

        assert!(!directory.set_mute(&id, false));
        assert!(!directory.set_volume(&id, 100));
        assert!(!directory.set_meter(&id, 0.0, 0.0));
        assert!(!directory.set_profile(&id, "Ada", ""));
        assert!(drain(&rx).is_empty());

        assert!(directory.set_volume(&id, 250));
        assert_eq!(directory.get(&id).unwrap().volume, 100);
    }

    #[test]
    fn test_device_toggle_publishes_show_and_hide_once() {
        let (mut directory, rx) = directory();
        let id = ParticipantId::from("u1");
        directory.insert_if_absent(&id, "Ada", "");
        drain(&rx);

        directory.set_device(&id, Some(DeviceRef::Primary("d1".into())));
        directory.set_device(&id, Some(DeviceRef::secondary(&id)));
        directory.set_device(&id, None);
        directory.set_device(&id, None);
        directory.set_device(&id, Some(DeviceRef::Primary("d1".into())));

        assert_eq!(
            drain(&rx),
            vec![
                ParticipantEvent::Shown { id: id.clone() },
                ParticipantEvent::Hidden { id: id.clone() },
                ParticipantEvent::Shown { id },
            ]
        );
    }

    #[test]
    fn test_identity_order() {
        let (mut directory, _rx) = directory();
        for id in ["carol", "alice", "bob"] {
            directory.insert_if_absent(&ParticipantId::from(id), id, "");
        }

        let ids: Vec<&str> = directory.ids().map(ParticipantId::as_str).collect();
        assert_eq!(ids, ["alice", "bob", "carol"]);
    }

    #[test]
    fn test_mutating_unknown_participant_is_noop() {
        let (mut directory, rx) = directory();
        let ghost = ParticipantId::from("ghost");

        assert!(!directory.set_mute(&ghost, true));
        assert!(!directory.set_device(&ghost, Some(DeviceRef::secondary(&ghost))));
        directory.clear();

        assert!(drain(&rx).is_empty());
    }
}
