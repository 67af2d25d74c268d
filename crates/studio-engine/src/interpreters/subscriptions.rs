//! Subscriptions channel.

use studio_ipc::ParticipantId;
use tracing::debug;

use crate::state::{Effect, StudioCore};
use crate::wire::SubscriptionMessage;

impl StudioCore {
    /// A user subscribed to the studio. Known users are ignored.
    pub(crate) fn on_subscription(&mut self, message: SubscriptionMessage) -> Vec<Effect> {
        if message.user_id.is_empty() {
            debug!("Subscription without user id");
            return Vec::new();
        }
        let id = ParticipantId::from(message.user_id);
        if !self
            .directory
            .insert_if_absent(&id, &message.nickname, &message.picture)
        {
            return Vec::new();
        }
        vec![Effect::FetchAvatar {
            id,
            url: message.picture,
        }]
    }
}
