//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use studio_api::{join_url, ApiClient, StudioApi};
use studio_engine::create_engine;
use studio_ipc::{
    command_channel, EventBus, ParticipantEvent, StudioCommand, StudioConfig, StudioEvent,
};
use studio_recording::{
    default_download_root, enqueue_segments, DownloadPlan, RecordingCatalog, SegmentQueue,
};
use tracing::{debug, error, info, warn};

/// How long to wait for the engine to answer a request.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// A running engine thread and its channels.
struct EngineHandle {
    commands: Sender<StudioCommand>,
    events: Receiver<StudioEvent>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    fn start(config: StudioConfig) -> Result<Self> {
        let api: Arc<dyn StudioApi> =
            Arc::new(ApiClient::from_config(&config).context("Failed to create API client")?);
        let bus = EventBus::new(config.event_channel_capacity);
        let events = bus.subscribe();
        let (commands, command_rx) = command_channel();

        let mut engine = create_engine(config, api, command_rx, bus)?;
        let thread = thread::Builder::new()
            .name("studio-engine".into())
            .spawn(move || {
                info!("Engine thread starting");
                engine.run();
                info!("Engine thread stopped");
            })?;

        Ok(Self {
            commands,
            events,
            thread: Some(thread),
        })
    }

    fn send(&self, command: StudioCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|e| anyhow!("Failed to send command: {}", e))
    }

    /// Send `command` and wait for the first event `select` accepts.
    fn request<T>(
        &self,
        command: StudioCommand,
        select: impl Fn(StudioEvent) -> Option<Result<T>>,
    ) -> Result<T> {
        self.send(command)?;
        loop {
            match self.events.recv_timeout(RESPONSE_TIMEOUT) {
                Ok(event) => {
                    if let Some(result) = select(event) {
                        return result;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Err(anyhow!("Timed out waiting for engine")),
                Err(RecvTimeoutError::Disconnected) => return Err(anyhow!("Engine stopped")),
            }
        }
    }

    fn shutdown(&mut self) {
        // The engine may already be gone after a Ctrl-C.
        let _ = self.commands.send(StudioCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Join a studio and log events until Ctrl-C.
pub fn watch(config: StudioConfig, server_id: String, token: String) -> Result<()> {
    let mut engine = EngineHandle::start(config)?;

    let interrupt = engine.commands.clone();
    ctrlc::set_handler(move || {
        info!("Received Ctrl-C signal. Shutting down...");
        let _ = interrupt.send(StudioCommand::GetStats);
        let _ = interrupt.send(StudioCommand::Shutdown);
    })
    .context("Failed to set Ctrl-C handler")?;

    engine.send(StudioCommand::Show { server_id, token })?;

    for event in engine.events.iter() {
        if event == StudioEvent::Shutdown {
            break;
        }
        log_event(&event);
    }

    engine.shutdown();
    Ok(())
}

fn log_event(event: &StudioEvent) {
    match event {
        StudioEvent::StateChanged { previous, current } => {
            info!(from = previous.name(), to = current.name(), "Session phase changed");
        }
        StudioEvent::SessionChanged(field) => info!(?field, "Studio field changed"),
        StudioEvent::Participant(ParticipantEvent::MeterChanged { id, left, right }) => {
            debug!(%id, left, right, "Meter");
        }
        StudioEvent::Participant(ParticipantEvent::Shown { id }) => info!(%id, "Participant live"),
        StudioEvent::Participant(ParticipantEvent::Hidden { id }) => {
            info!(%id, "Participant idle");
        }
        StudioEvent::Participant(participant) => info!(?participant, "Participant changed"),
        StudioEvent::AvatarReady { id, fallback } => debug!(%id, fallback, "Avatar ready"),
        StudioEvent::Connection { channel, status } => {
            info!(%channel, status = %status.message(), "Connection");
        }
        StudioEvent::CommandRejected { id, reason } => warn!(%id, %reason, "Edit rejected"),
        StudioEvent::Stats(stats) => {
            for channel in stats {
                info!(
                    channel = %channel.channel,
                    messages = channel.messages,
                    decode_failures = channel.decode_failures,
                    reconnects = channel.reconnects,
                    failures = channel.failures,
                    "Channel stats"
                );
            }
        }
        StudioEvent::Error { recoverable, message } => error!(recoverable, %message, "Engine error"),
        other => debug!(?other, "Event"),
    }
}

/// Print the desktop-client link for a studio.
pub fn join(server_id: &str) -> Result<()> {
    let url = join_url(server_id).context("Failed to build join link")?;
    println!("{url}");
    Ok(())
}

/// Print the studios visible to the user.
pub fn studios(config: StudioConfig, token: String) -> Result<()> {
    let engine = EngineHandle::start(config)?;
    let studios = engine.request(StudioCommand::ListStudios { token }, |event| match event {
        StudioEvent::Studios(studios) => Some(Ok(studios)),
        StudioEvent::Error { message, .. } => Some(Err(anyhow!(message))),
        _ => None,
    })?;

    for studio in studios {
        println!("{}\t{}", studio.id, studio.name);
    }
    Ok(())
}

/// Print the recordings of a studio and optionally fetch one.
pub fn recordings(
    config: &StudioConfig,
    server_id: &str,
    token: &str,
    download: Option<&str>,
    dir: Option<PathBuf>,
) -> Result<()> {
    let api = Arc::new(ApiClient::from_config(config).context("Failed to create API client")?);
    let catalog = RecordingCatalog::new(api, token, dir.unwrap_or_else(default_download_root));

    for recording in catalog.recordings(server_id)? {
        println!("{}\t{}", recording.id, recording.name);
    }

    let Some(recording_id) = download else {
        return Ok(());
    };
    match catalog.plan(server_id, recording_id)? {
        DownloadPlan::Local { dir } => {
            let queue = SegmentQueue::new();
            let count = catalog.enqueue(recording_id, &queue)?;
            println!("{} segments already in {}", count, dir.display());
        }
        plan => {
            let archive = catalog.download(&plan)?;
            println!("Downloaded {}", archive.display());
        }
    }
    Ok(())
}

/// Pass every segment in `dir` from a producer thread to this one.
pub fn segments(dir: &Path) -> Result<()> {
    let queue = Arc::new(SegmentQueue::new());

    let producer = {
        let queue = Arc::clone(&queue);
        let dir = dir.to_path_buf();
        thread::Builder::new()
            .name("segment-producer".into())
            .spawn(move || {
                let result = enqueue_segments(&dir, &queue);
                queue.close();
                result
            })?
    };

    let mut consumed = 0usize;
    while let Some(segment) = queue.pop() {
        consumed += 1;
        println!("{}", segment.display());
    }

    let produced = producer
        .join()
        .map_err(|_| anyhow!("Segment producer panicked"))?
        .with_context(|| format!("Failed to scan {}", dir.display()))?;
    info!(produced, consumed, "Segments drained");
    Ok(())
}
