//! Server channel.

use studio_ipc::{EventBus, ParticipantId, SessionField, StudioEvent};
use tracing::debug;

use crate::state::{Effect, StudioCore};
use crate::wire::ServerMessage;

impl StudioCore {
    /// Apply server-level fields, then start or stop live feeds to match.
    pub(crate) fn on_server_message(&mut self, message: ServerMessage) -> Vec<Effect> {
        let state = match message {
            ServerMessage::Alert(alert) => {
                debug!(message = %alert.message, "Ignoring server alert");
                return Vec::new();
            }
            ServerMessage::State(state) => state,
        };

        let mut effects = Vec::new();
        let bus = &self.bus;
        let fields = &mut self.server;

        update(bus, &mut fields.name, state.name, SessionField::Name);
        update(bus, &mut fields.status, state.status, SessionField::Status);
        update(bus, &mut fields.banner, state.banner_url, SessionField::Banner);
        update(bus, &mut fields.session_id, state.session_id, SessionField::SessionId);
        if update(bus, &mut fields.owner_id, state.owner_id, SessionField::OwnerId)
            && !fields.owner_id.is_empty()
        {
            effects.push(Effect::FetchOwner(ParticipantId::from(
                fields.owner_id.as_str(),
            )));
        }
        update(bus, &mut fields.sample_rate, state.sample_rate, SessionField::SampleRate);
        update(bus, &mut fields.broadcast, state.broadcast, SessionField::Broadcast);
        update(bus, &mut fields.enabled, state.enabled, SessionField::Enabled);

        effects.extend(self.evaluate_live_feeds());
        effects
    }
}

/// Store `value` and publish it, unless it is absent or nothing changed.
fn update<T: PartialEq + Clone>(
    bus: &EventBus,
    slot: &mut T,
    value: Option<T>,
    field: fn(T) -> SessionField,
) -> bool {
    let Some(value) = value else {
        return false;
    };
    if *slot == value {
        return false;
    }
    *slot = value.clone();
    bus.publish(StudioEvent::SessionChanged(field(value)));
    true
}
