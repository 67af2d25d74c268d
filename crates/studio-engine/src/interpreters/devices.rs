//! Devices channel.

use studio_ipc::{DeviceRef, ParticipantId};
use tracing::{debug, trace};

use crate::state::{Effect, StudioCore};
use crate::wire::DeviceMessage;

impl StudioCore {
    /// A primary device joined, changed or left.
    ///
    /// Mute and volume reported here are authoritative and are applied
    /// without a round trip back to the server.
    pub(crate) fn on_device(&mut self, message: DeviceMessage) -> Vec<Effect> {
        let device = DeviceRef::parse(&message.id);

        if message.is_retired() {
            if let Some(owner) = self.devices.retire(&device) {
                debug!(%device, %owner, "Device retired");
            }
            return Vec::new();
        }

        if message.owner_id.is_empty() {
            debug!(%device, "Device without owner");
            return Vec::new();
        }

        let owner = ParticipantId::from(message.owner_id.as_str());
        self.devices.upsert(device, owner.clone());

        if self.directory.contains(&owner) {
            self.directory.set_mute(&owner, message.capture_mute);
            self.directory.set_volume(&owner, message.volume_percent());
        } else {
            trace!(%owner, "Device owner not in directory yet");
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use studio_ipc::{Channel, DeviceRef, ParticipantEvent};

    use crate::interpreters::testing::Harness;

    fn device(owner: &str, server: &str, mute: bool, volume: u32) -> String {
        format!(
            r#"{{"id":"d1","ownerId":"{owner}","serverId":"{server}","captureMute":{mute},"captureVolume":{volume}}}"#
        )
    }

    #[test]
    fn test_last_message_decides_owner() {
        let mut harness = Harness::joined();
        let d1 = DeviceRef::Primary("d1".into());

        for message in [
            device("a", "srv1", false, 50),
            device("b", "srv1", false, 50),
            device("b", "", false, 50),
            device("c", "srv1", false, 50),
        ] {
            harness.send(Channel::Devices, &message);
        }
        assert_eq!(harness.core.devices().owner_of(&d1), Some(&Harness::id("c")));

        harness.send(Channel::Devices, r#"{"id":"d1","ownerId":"c"}"#);
        assert_eq!(harness.core.devices().owner_of(&d1), None);
    }

    #[test]
    fn test_device_state_applies_to_known_owner() {
        let mut harness = Harness::joined();
        harness.subscribe("u1");
        harness.drain();

        let effects = harness.send(Channel::Devices, &device("u1", "srv1", true, 40));

        assert!(effects.is_empty());
        let u1 = Harness::id("u1");
        assert_eq!(
            harness.participant_events(),
            vec![
                ParticipantEvent::MuteChanged {
                    id: u1.clone(),
                    muted: true
                },
                ParticipantEvent::VolumeChanged {
                    id: u1.clone(),
                    volume: 40
                },
            ]
        );
        let participant = harness.core.directory().get(&u1).unwrap();
        assert!(participant.muted);
        assert_eq!(participant.volume, 40);
        // Announcing a device does not make its owner active.
        assert!(!participant.is_active());
    }

    #[test]
    fn test_device_for_unknown_owner_only_updates_map() {
        let mut harness = Harness::joined();

        harness.send(Channel::Devices, &device("ghost", "srv1", true, 10));

        assert!(harness.core.directory().is_empty());
        assert!(harness.drain().is_empty());
        assert_eq!(harness.core.devices().len(), 1);
    }
}
