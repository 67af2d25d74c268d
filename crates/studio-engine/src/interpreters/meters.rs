//! Meters channel.
//!
//! Every tick lists the devices currently carrying audio. Whoever owns one of
//! them is active; everyone else in the directory is not.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use studio_ipc::{DeviceRef, ParticipantId};
use tracing::trace;

use crate::state::{Effect, StudioCore};
use crate::wire::MetersMessage;

/// Convert a level in dBFS to linear amplitude.
pub fn db_to_linear(db: f64) -> f32 {
    10f64.powf(db / 20.0) as f32
}

impl StudioCore {
    pub(crate) fn on_meters(&mut self, message: MetersMessage) -> Vec<Effect> {
        if !self.phase.is_live() {
            return Vec::new();
        }

        // Best device per owner this tick; primary beats secondary.
        let mut resolved: BTreeMap<ParticipantId, (DeviceRef, Option<(f64, f64)>)> =
            BTreeMap::new();
        for (index, client) in message.clients.iter().enumerate() {
            if self.ignored_meter_devices.iter().any(|name| name == client) {
                continue;
            }
            let device = DeviceRef::parse(client);
            let Some(owner) = self.devices.resolve(&device) else {
                trace!(%device, "Unresolved meter device");
                continue;
            };
            let levels = message.levels(index);
            match resolved.entry(owner) {
                Entry::Vacant(entry) => {
                    entry.insert((device, levels));
                }
                Entry::Occupied(mut entry) => {
                    if entry.get().0.is_secondary() && device.is_primary() {
                        entry.insert((device, levels));
                    }
                }
            }
        }

        let mut effects = Vec::new();
        for (owner, (device, levels)) in &resolved {
            if !self.directory.contains(owner) {
                self.directory.insert_if_absent(owner, owner.as_str(), "");
                effects.push(Effect::FetchOwner(owner.clone()));
            }
            if let Some((left, right)) = levels {
                self.directory
                    .set_meter(owner, db_to_linear(*left), db_to_linear(*right));
            }
            self.directory.set_device(owner, Some(device.clone()));
        }

        let inactive: Vec<ParticipantId> = self
            .directory
            .ids()
            .filter(|id| !resolved.contains_key(*id))
            .cloned()
            .collect();
        for id in &inactive {
            self.directory.set_device(id, None);
        }

        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_ipc::{Channel, ParticipantEvent};

    use crate::interpreters::testing::Harness;

    fn meters(clients: &[&str], levels: &[[f64; 2]]) -> String {
        serde_json::json!({ "clients": clients, "musicians": levels }).to_string()
    }

    fn shows_and_hides(events: Vec<ParticipantEvent>) -> Vec<ParticipantEvent> {
        events
            .into_iter()
            .filter(|event| {
                matches!(
                    event,
                    ParticipantEvent::Shown { .. } | ParticipantEvent::Hidden { .. }
                )
            })
            .collect()
    }

    #[test]
    fn test_db_to_linear() {
        assert_eq!(db_to_linear(0.0), 1.0);
        assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-6);
        assert!((db_to_linear(-6.0) - 0.501).abs() < 1e-3);
        let mut previous = 0.0;
        for db in (-120..=12).map(f64::from) {
            let linear = db_to_linear(db);
            assert!(linear > previous);
            previous = linear;
        }
    }

    #[test]
    fn test_secondary_participant_goes_live() {
        let mut harness = Harness::live();
        harness.subscribe("u1");
        harness.drain();

        let effects = harness.send(Channel::Meters, &meters(&["rtc-u1"], &[[-6.0, -6.0]]));

        assert!(effects.is_empty());
        let u1 = Harness::id("u1");
        let participant = harness.core.directory().get(&u1).unwrap();
        assert_eq!(participant.device, Some(DeviceRef::secondary(&u1)));
        assert!((participant.left_level - 0.501).abs() < 1e-3);
        assert_eq!(
            shows_and_hides(harness.participant_events()),
            vec![ParticipantEvent::Shown { id: u1 }]
        );
    }

    #[test]
    fn test_hide_then_reappear() {
        let mut harness = Harness::live();
        harness.subscribe("u1");
        let tick = meters(&["rtc-u1"], &[[-10.0, -10.0]]);
        let u1 = Harness::id("u1");

        harness.send(Channel::Meters, &tick);
        harness.send(Channel::Meters, &tick);
        harness.send(Channel::Meters, &meters(&[], &[]));
        harness.send(Channel::Meters, &meters(&[], &[]));
        harness.send(Channel::Meters, &tick);

        assert_eq!(
            shows_and_hides(harness.participant_events()),
            vec![
                ParticipantEvent::Shown { id: u1.clone() },
                ParticipantEvent::Hidden { id: u1.clone() },
                ParticipantEvent::Shown { id: u1 },
            ]
        );
    }

    #[test]
    fn test_primary_device_beats_secondary() {
        let mut harness = Harness::live();
        harness.subscribe("u1");
        harness.send(
            Channel::Devices,
            r#"{"id":"d1","ownerId":"u1","serverId":"srv1","captureMute":false,"captureVolume":80}"#,
        );

        harness.send(
            Channel::Meters,
            &meters(&["rtc-u1", "d1"], &[[-40.0, -40.0], [0.0, -20.0]]),
        );

        let participant = harness.core.directory().get(&Harness::id("u1")).unwrap();
        assert_eq!(participant.device, Some(DeviceRef::Primary("d1".into())));
        assert_eq!(participant.left_level, 1.0);
    }

    #[test]
    fn test_device_swap_is_silent() {
        let mut harness = Harness::live();
        harness.subscribe("u1");
        harness.send(
            Channel::Devices,
            r#"{"id":"d1","ownerId":"u1","serverId":"srv1","captureMute":false,"captureVolume":80}"#,
        );
        harness.send(Channel::Meters, &meters(&["rtc-u1"], &[[-6.0, -6.0]]));
        harness.drain();

        harness.send(Channel::Meters, &meters(&["d1"], &[[-6.0, -6.0]]));

        assert!(shows_and_hides(harness.participant_events()).is_empty());
        let participant = harness.core.directory().get(&Harness::id("u1")).unwrap();
        assert_eq!(participant.device, Some(DeviceRef::Primary("d1".into())));
    }

    #[test]
    fn test_ignored_and_unknown_devices() {
        let mut harness = Harness::live();

        let effects = harness.send(
            Channel::Meters,
            &meters(&["Jamulus", "supernova", "d404"], &[[0.0, 0.0]; 3]),
        );

        assert!(effects.is_empty());
        assert!(harness.core.directory().is_empty());
    }

    #[test]
    fn test_unknown_owner_becomes_placeholder() {
        let mut harness = Harness::live();

        let effects = harness.send(Channel::Meters, &meters(&["rtc-u7"], &[[-6.0, -6.0]]));

        let u7 = Harness::id("u7");
        assert_eq!(effects, vec![Effect::FetchOwner(u7.clone())]);
        let participant = harness.core.directory().get(&u7).unwrap();
        assert_eq!(participant.name, "u7");
        assert!(participant.is_active());

        // Already a placeholder: no second lookup.
        let effects = harness.send(Channel::Meters, &meters(&["rtc-u7"], &[[-6.0, -6.0]]));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_missing_levels_keep_previous_values() {
        let mut harness = Harness::live();
        harness.subscribe("u1");
        harness.send(Channel::Meters, &meters(&["rtc-u1"], &[[0.0, 0.0]]));

        harness.send(
            Channel::Meters,
            r#"{"clients":["rtc-u1"],"musicians":[[-20]]}"#,
        );

        let participant = harness.core.directory().get(&Harness::id("u1")).unwrap();
        assert!(participant.is_active());
        assert_eq!(participant.left_level, 1.0);
    }

    #[test]
    fn test_polled_out_secondary_is_hidden() {
        let mut harness = Harness::live();
        harness.subscribe("u1");
        let tick = meters(&["rtc-u1"], &[[-6.0, -6.0]]);
        harness.send(Channel::Meters, &tick);

        harness.core.apply_poll(vec![]);
        harness.send(Channel::Meters, &tick);

        assert!(!harness
            .core
            .directory()
            .get(&Harness::id("u1"))
            .unwrap()
            .is_active());

        harness.core.apply_poll(vec!["u1".to_string()]);
        harness.send(Channel::Meters, &tick);
        assert!(harness
            .core
            .directory()
            .get(&Harness::id("u1"))
            .unwrap()
            .is_active());
    }

    #[test]
    fn test_meters_ignored_when_not_live() {
        let mut harness = Harness::joined();
        harness.subscribe("u1");

        harness.send(Channel::Meters, &meters(&["rtc-u1"], &[[-6.0, -6.0]]));

        assert!(!harness
            .core
            .directory()
            .get(&Harness::id("u1"))
            .unwrap()
            .is_active());
    }
}
