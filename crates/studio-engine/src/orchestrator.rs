//! Main engine orchestrator.

use std::sync::Arc;

use crossbeam_channel::{select, Receiver, Sender};
use studio_api::StudioApi;
use studio_ipc::{
    Channel, ConnectionStatus, EventBus, ParticipantId, StudioCommand, StudioConfig, StudioEvent,
};
use studio_transport::{TransportEvent, TransportEventKind};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::avatars::AvatarCache;
use crate::state::{Effect, StudioCore};
use crate::error::{ControlError, EngineResult};
use crate::rest_worker::{RestJob, RestWorker, WorkerResult};
use crate::session::SessionResources;
use crate::stats::StatsCollector;

/// The studio sync engine.
///
/// Owns all session state and runs on a single thread; connection workers,
/// the poller and the REST worker report back over channels.
pub struct Engine {
    config: StudioConfig,
    api: Arc<dyn StudioApi>,
    command_rx: Receiver<StudioCommand>,
    bus: EventBus,
    core: StudioCore,
    stats: Arc<StatsCollector>,
    avatars: AvatarCache,
    transport_tx: Sender<TransportEvent>,
    transport_rx: Receiver<TransportEvent>,
    results_tx: Sender<WorkerResult>,
    results_rx: Receiver<WorkerResult>,
    rest: RestWorker,
    session: Option<SessionResources>,
    /// Bumped whenever a session opens or closes.
    epoch: u64,
}

impl Engine {
    /// Create a new engine.
    pub fn new(
        config: StudioConfig,
        api: Arc<dyn StudioApi>,
        command_rx: Receiver<StudioCommand>,
        bus: EventBus,
    ) -> EngineResult<Self> {
        // Unbounded: workers must never block on the engine thread.
        let (transport_tx, transport_rx) = crossbeam_channel::unbounded();
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let rest = RestWorker::spawn(Arc::clone(&api), results_tx.clone())?;

        Ok(Self {
            core: StudioCore::new(&config, bus.clone()),
            config,
            api,
            command_rx,
            bus,
            stats: Arc::new(StatsCollector::new()),
            avatars: AvatarCache::new(),
            transport_tx,
            transport_rx,
            results_tx,
            results_rx,
            rest,
            session: None,
            epoch: 0,
        })
    }

    /// Shared view of downloaded avatars.
    pub fn avatars(&self) -> AvatarCache {
        self.avatars.clone()
    }

    pub fn stats(&self) -> Arc<StatsCollector> {
        Arc::clone(&self.stats)
    }

    /// Run the engine (blocking) until `Shutdown` or the command channel closes.
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");
        self.bus.publish(StudioEvent::Ready);

        let commands = self.command_rx.clone();
        let transport = self.transport_rx.clone();
        let results = self.results_rx.clone();

        loop {
            select! {
                recv(commands) -> command => match command {
                    Ok(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    Err(_) => {
                        info!("Command channel disconnected, shutting down");
                        self.close_session();
                        break;
                    }
                },
                recv(transport) -> event => {
                    if let Ok(event) = event {
                        self.handle_transport_event(event);
                    }
                },
                recv(results) -> result => {
                    if let Ok(result) = result {
                        self.handle_result(result);
                    }
                },
            }
        }

        info!("Engine stopped");
    }

    /// Handle a command. Returns false if the engine should stop.
    fn handle_command(&mut self, command: StudioCommand) -> bool {
        debug!(?command, "Handling command");

        match command {
            StudioCommand::Show { server_id, token } => self.show(server_id, token),
            StudioCommand::Hide => self.close_session(),
            StudioCommand::SetMute { id, muted } => {
                let result = self.core.set_mute(&id, muted);
                self.apply_edit(&id, result);
            }
            StudioCommand::SetVolume { id, volume } => {
                let result = self.core.set_volume(&id, volume);
                self.apply_edit(&id, result);
            }
            StudioCommand::GetSnapshot => {
                let snapshot = self.core.snapshot(self.stats.snapshot());
                self.bus.publish(StudioEvent::Snapshot(Box::new(snapshot)));
            }
            StudioCommand::GetStats => {
                self.bus.publish(StudioEvent::Stats(self.stats.snapshot()));
            }
            StudioCommand::ListStudios { token } => {
                self.rest.submit(RestJob::ListStudios { token });
            }
            StudioCommand::ListRecordings { server_id, token } => {
                self.rest.submit(RestJob::ListRecordings { token, server_id });
            }
            StudioCommand::ResolveRecording {
                server_id,
                recording_id,
                token,
            } => {
                self.rest.submit(RestJob::ResolveRecording {
                    token,
                    server_id,
                    recording_id,
                });
            }
            StudioCommand::Shutdown => {
                self.close_session();
                self.bus.publish(StudioEvent::Shutdown);
                return false;
            }
        }

        true
    }

    /// Open the panel for a studio, replacing any open one.
    fn show(&mut self, server_id: String, token: String) {
        if server_id.is_empty() || token.is_empty() {
            debug!("Missing server id or token, closing session");
            self.close_session();
            return;
        }
        if let Some(session) = &self.session {
            if session.server_id() == server_id && session.token() == token {
                debug!(%server_id, "Studio already open");
                return;
            }
        }
        self.close_session();
        self.open_session(&server_id, &token);
    }

    #[instrument(name = "open_session", skip(self, token))]
    fn open_session(&mut self, server_id: &str, token: &str) {
        self.epoch += 1;
        self.stats.reset();

        match SessionResources::open(
            &self.config,
            server_id,
            token,
            self.epoch,
            self.transport_tx.clone(),
        ) {
            Ok(session) => {
                self.core.begin(server_id);
                self.session = Some(session);
                self.rest.submit(RestJob::ServerInfo {
                    epoch: self.epoch,
                    token: token.to_string(),
                    server_id: server_id.to_string(),
                });
                info!("Studio opened");
            }
            Err(e) => {
                error!("Failed to open studio: {}", e);
                self.bus.publish(StudioEvent::Error {
                    recoverable: true,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Stop every worker of the open session, then drop its state.
    fn close_session(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        info!(server_id = %session.server_id(), "Closing studio");
        session.shutdown();
        self.epoch += 1;
        self.core.end();
        self.avatars.clear();
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        let accepted = self
            .session
            .as_ref()
            .is_some_and(|session| session.accepts(&event));
        if !accepted {
            trace!(channel = %event.channel, connection = %event.connection, "Dropping stale event");
            return;
        }

        let channel = event.channel;
        match event.kind {
            TransportEventKind::Opened => {
                self.publish_status(channel, ConnectionStatus::Open);
            }
            TransportEventKind::Message { text } => {
                self.stats.record_message(channel);
                match self.core.handle_message(channel, &text) {
                    Ok(effects) => self.execute(effects),
                    Err(e) => {
                        self.stats.record_decode_failure(channel);
                        warn!("Dropping message: {}", e);
                    }
                }
            }
            TransportEventKind::Failed { reason } => {
                self.stats.record_failure(channel);
                warn!(%channel, "Channel failed: {}", reason);
                self.publish_status(channel, ConnectionStatus::Failed { reason });
            }
            TransportEventKind::Closed { code, reason } => {
                debug!(%channel, code, %reason, "Channel closed");
                self.publish_status(channel, ConnectionStatus::Closed);
            }
            TransportEventKind::Reconnecting { attempt, delay } => {
                self.stats.record_reconnect(channel);
                debug!(%channel, attempt, ?delay, "Channel reconnecting");
                self.publish_status(channel, ConnectionStatus::Connecting);
            }
        }
    }

    fn handle_result(&mut self, result: WorkerResult) {
        match result {
            WorkerResult::Admin { epoch, admin } if epoch == self.epoch => {
                self.core.set_admin(admin);
            }
            WorkerResult::Owner { epoch, profile } if epoch == self.epoch => {
                let effects = self.core.apply_owner_profile(&profile);
                self.execute(effects);
            }
            WorkerResult::Avatar { epoch, id, image } if epoch == self.epoch => {
                let fallback = image.is_none();
                self.avatars.set(&id, image);
                self.bus.publish(StudioEvent::AvatarReady { id, fallback });
            }
            WorkerResult::ActiveParticipants {
                epoch,
                generation,
                ids,
            } if epoch == self.epoch => {
                let current = self
                    .session
                    .as_ref()
                    .is_some_and(|session| session.accepts_poll(generation));
                if current {
                    self.core.apply_poll(ids);
                }
            }
            WorkerResult::Studios(result) => match result {
                Ok(studios) => self.bus.publish(StudioEvent::Studios(studios)),
                Err(e) => self.report_error(e),
            },
            WorkerResult::Recordings { server_id, result } => match result {
                Ok(recordings) => self.bus.publish(StudioEvent::Recordings {
                    server_id,
                    recordings,
                }),
                Err(e) => self.report_error(e),
            },
            WorkerResult::RecordingUrl {
                recording_id,
                result,
            } => match result {
                Ok(url) => self
                    .bus
                    .publish(StudioEvent::RecordingUrl { recording_id, url }),
                Err(e) => self.report_error(e),
            },
            stale => trace!(?stale, "Dropping result of a closed session"),
        }
    }

    fn apply_edit(&mut self, id: &ParticipantId, result: Result<Effect, ControlError>) {
        match result {
            Ok(effect) => self.execute(vec![effect]),
            Err(ControlError::UnknownParticipant(_)) => {
                warn!(%id, "Edit for unknown participant");
            }
            Err(e) => debug!("{}", e),
        }
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.execute_one(effect);
        }
    }

    fn execute_one(&mut self, effect: Effect) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let epoch = self.epoch;

        match effect {
            Effect::StartLiveFeeds { session_id } => {
                if let Err(e) =
                    session.start_live(&session_id, Arc::clone(&self.api), self.results_tx.clone())
                {
                    error!(%session_id, "Failed to start live feeds: {}", e);
                    self.bus.publish(StudioEvent::Error {
                        recoverable: true,
                        message: e.to_string(),
                    });
                }
            }
            Effect::StopLiveFeeds => session.stop_live(),
            Effect::FetchOwner(user_id) => self.rest.submit(RestJob::Owner {
                epoch,
                token: session.token().to_string(),
                user_id,
            }),
            Effect::FetchAvatar { id, url } => self.rest.submit(RestJob::Avatar { epoch, id, url }),
            Effect::PushDevice { device_id, update } => self.rest.submit(RestJob::PushDevice {
                token: session.token().to_string(),
                device_id,
                update,
            }),
        }
    }

    fn publish_status(&self, channel: Channel, status: ConnectionStatus) {
        self.bus.publish(StudioEvent::Connection { channel, status });
    }

    fn report_error(&self, error: studio_api::ApiError) {
        warn!("Request failed: {}", error);
        self.bus.publish(StudioEvent::Error {
            recoverable: true,
            message: error.to_string(),
        });
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close_session();
        self.rest.shutdown();
    }
}
