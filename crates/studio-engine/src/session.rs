//! Workers owned by an open session.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Sender;
use studio_api::{meters_url, stream_url, StudioApi};
use studio_ipc::{Channel, StudioConfig};
use studio_transport::{ConnectionId, ConnectionManager, ReconnectPolicy, TransportEvent};
use tracing::{debug, info, instrument};

use crate::error::EngineResult;
use crate::poller::{PollTarget, Poller};
use crate::rest_worker::WorkerResult;

/// Channels that run for the whole session.
const BASE_CHANNELS: [Channel; 3] = [Channel::Server, Channel::Subscriptions, Channel::Devices];

/// Connections and the poller of one session.
///
/// Transport events carry the connection they came from. An event is only
/// accepted while its channel has a live manager and its connection is not
/// older than that manager's first connection, which filters out anything a
/// stopped worker left in the queue.
pub(crate) struct SessionResources {
    server_id: String,
    token: String,
    epoch: u64,
    config: StudioConfig,
    events: Sender<TransportEvent>,
    base: HashMap<Channel, ConnectionManager>,
    meters: Option<ConnectionManager>,
    poller: Option<Poller>,
    floors: HashMap<Channel, ConnectionId>,
    generation: u64,
}

impl SessionResources {
    /// Connect the base channels of `server_id`.
    #[instrument(name = "open_session", skip(config, token, events))]
    pub fn open(
        config: &StudioConfig,
        server_id: &str,
        token: &str,
        epoch: u64,
        events: Sender<TransportEvent>,
    ) -> EngineResult<Self> {
        let mut resources = Self {
            server_id: server_id.to_string(),
            token: token.to_string(),
            epoch,
            config: config.clone(),
            events,
            base: HashMap::new(),
            meters: None,
            poller: None,
            floors: HashMap::new(),
            generation: 0,
        };

        for channel in BASE_CHANNELS {
            let url = stream_url(&config.api_host, channel, server_id, token)?;
            // Dropping `resources` on error shuts down what already started.
            let manager = resources.connect(channel, url.as_str())?;
            resources.base.insert(channel, manager);
        }

        info!(server_id, "Session channels started");
        Ok(resources)
    }

    /// Start the meters channel and the poller for `session_id`.
    ///
    /// Any previous live feeds are stopped first.
    #[instrument(name = "start_live", skip(self, api, results))]
    pub fn start_live(
        &mut self,
        session_id: &str,
        api: Arc<dyn StudioApi>,
        results: Sender<WorkerResult>,
    ) -> EngineResult<()> {
        self.stop_live();

        let url = meters_url(&self.config.meters_domain, &self.server_id, session_id)?;
        let manager = self.connect(Channel::Meters, url.as_str())?;
        self.meters = Some(manager);

        self.generation += 1;
        let target = PollTarget {
            token: self.token.clone(),
            server_id: self.server_id.clone(),
            interval: self.config.poll_interval(),
            epoch: self.epoch,
            generation: self.generation,
        };
        self.poller = Some(Poller::spawn(api, target, results)?);
        Ok(())
    }

    /// Stop the poller, then the meters channel.
    #[instrument(name = "stop_live", skip(self))]
    pub fn stop_live(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
        if let Some(mut meters) = self.meters.take() {
            meters.shutdown();
        }
        self.floors.remove(&Channel::Meters);
    }

    /// Whether `event` comes from a connection this session still owns.
    pub fn accepts(&self, event: &TransportEvent) -> bool {
        let running = match event.channel {
            Channel::Meters => self.meters.is_some(),
            channel => self.base.contains_key(&channel),
        };
        running
            && self
                .floors
                .get(&event.channel)
                .is_some_and(|floor| event.connection >= *floor)
    }

    /// Whether a poll result of `generation` belongs to the running poller.
    pub fn accepts_poll(&self, generation: u64) -> bool {
        self.poller
            .as_ref()
            .is_some_and(|poller| poller.generation() == generation)
    }

    pub fn is_live(&self) -> bool {
        self.meters.is_some()
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Stop live feeds, then the base channels. Every worker is joined.
    #[instrument(name = "shutdown_session", skip(self), fields(server_id = %self.server_id))]
    pub fn shutdown(&mut self) {
        self.stop_live();
        for (channel, mut manager) in self.base.drain() {
            debug!(%channel, "Stopping channel");
            manager.shutdown();
        }
        self.floors.clear();
    }

    fn connect(&mut self, channel: Channel, url: &str) -> EngineResult<ConnectionManager> {
        let mut manager = ConnectionManager::new(
            channel,
            url,
            &self.config.origin,
            ReconnectPolicy::from(&self.config.reconnect),
            self.events.clone(),
        )?;
        let first = manager.connect()?;
        self.floors.insert(channel, first);
        Ok(manager)
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        self.shutdown();
    }
}
