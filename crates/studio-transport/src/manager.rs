//! Connection manager for one streaming channel.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use studio_ipc::{Channel, ConnectionStatus};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{error, info, instrument};
use url::Url;

use crate::connection::ReconnectPolicy;
use crate::error::TransportError;
use crate::websocket::{Control, Worker};
use crate::TransportResult;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one physical connection. Every reconnect gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that happened on a channel's connection.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub channel: Channel,
    pub connection: ConnectionId,
    pub kind: TransportEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    /// Handshake succeeded; messages follow.
    Opened,

    /// A text payload arrived.
    Message { text: String },

    /// The channel gave up: initial handshake error or reconnects exhausted.
    Failed { reason: String },

    /// The connection closed, from either side.
    Closed { code: u16, reason: String },

    /// A new connection will be attempted after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
}

/// Owns the lifecycle of one channel's connection, including reconnects.
///
/// Events are delivered on the sender passed to [`ConnectionManager::new`].
/// The receiving side must keep draining it; an unbounded channel is
/// expected so a worker never blocks on a slow consumer.
pub struct ConnectionManager {
    channel: Channel,
    url: Url,
    origin: HeaderValue,
    policy: ReconnectPolicy,
    events: Sender<TransportEvent>,
    status: Arc<RwLock<ConnectionStatus>>,
    intent: Arc<AtomicBool>,
    current: Arc<AtomicU64>,
    control: Option<UnboundedSender<Control>>,
    worker: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create a manager for `url`. Nothing connects until [`connect`](Self::connect).
    pub fn new(
        channel: Channel,
        url: &str,
        origin: &str,
        policy: ReconnectPolicy,
        events: Sender<TransportEvent>,
    ) -> TransportResult<Self> {
        let url = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidUrl(format!(
                "URL must start with ws:// or wss://, got {}://",
                url.scheme()
            )));
        }
        let origin =
            HeaderValue::from_str(origin).map_err(|e| TransportError::InvalidHeader(e.to_string()))?;

        Ok(Self {
            channel,
            url,
            origin,
            policy,
            events,
            status: Arc::new(RwLock::new(ConnectionStatus::Closed)),
            intent: Arc::new(AtomicBool::new(true)),
            current: Arc::new(AtomicU64::new(0)),
            control: None,
            worker: None,
        })
    }

    /// Start connecting. Returns the id of the first connection immediately;
    /// the outcome arrives as an event.
    #[instrument(name = "ws_connect", skip(self), fields(channel = %self.channel))]
    pub fn connect(&mut self) -> TransportResult<ConnectionId> {
        if self.is_running() {
            return Err(TransportError::AlreadyConnected);
        }
        self.join_worker();

        let id = ConnectionId::next();
        self.current.store(id.value(), Ordering::SeqCst);
        *self.status.write() = ConnectionStatus::Connecting;

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let worker = Worker {
            channel: self.channel,
            url: self.url.clone(),
            origin: self.origin.clone(),
            policy: self.policy.clone(),
            events: self.events.clone(),
            status: Arc::clone(&self.status),
            intent: Arc::clone(&self.intent),
            current: Arc::clone(&self.current),
        };

        let spawned = thread::Builder::new()
            .name(format!("ws-{}", self.channel))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to create websocket runtime: {}", e);
                        worker.fail(id, e.to_string());
                        return;
                    }
                };
                runtime.block_on(worker.run(id, control_rx));
            });

        match spawned {
            Ok(handle) => {
                info!(%id, "Connecting");
                self.control = Some(control_tx);
                self.worker = Some(handle);
                Ok(id)
            }
            Err(e) => {
                *self.status.write() = ConnectionStatus::Failed {
                    reason: e.to_string(),
                };
                Err(TransportError::Io(e))
            }
        }
    }

    /// Close a connection explicitly. The channel stays closed.
    pub fn close(&self, id: ConnectionId, code: u16, reason: &str) -> TransportResult<()> {
        if !self.is_running() || self.current_connection() != Some(id) {
            return Err(TransportError::NotConnected);
        }
        let control = self.control.as_ref().ok_or(TransportError::NotConnected)?;
        control
            .send(Control::Close {
                id,
                code,
                reason: reason.to_string(),
            })
            .map_err(|_| TransportError::ChannelDisconnected)
    }

    /// Whether an abnormal close should be followed by a reconnect.
    pub fn set_reconnect_intent(&self, reconnect: bool) {
        self.intent.store(reconnect, Ordering::SeqCst);
    }

    pub fn reconnect_intent(&self) -> bool {
        self.intent.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.read().clone()
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Id of the connection currently owned by the worker, if any.
    pub fn current_connection(&self) -> Option<ConnectionId> {
        if !self.is_running() {
            return None;
        }
        Some(ConnectionId(self.current.load(Ordering::SeqCst)))
    }

    /// Stop reconnecting, close the connection and join the worker.
    ///
    /// No event is produced by this manager once this returns.
    #[instrument(name = "ws_shutdown", skip(self), fields(channel = %self.channel))]
    pub fn shutdown(&mut self) {
        self.intent.store(false, Ordering::SeqCst);
        if let Some(control) = self.control.take() {
            // A worker that already exited has dropped its receiver.
            let _ = control.send(Control::Stop);
        }
        self.join_worker();

        let mut status = self.status.write();
        if !status.is_failed() {
            *status = ConnectionStatus::Closed;
        }
    }

    fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!(channel = %self.channel, "Websocket worker panicked");
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
