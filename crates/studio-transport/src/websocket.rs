//! Websocket connection worker.
//!
//! The worker owns every connection a manager opens over its lifetime, one
//! at a time, and runs the reconnect cycle between them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use studio_ipc::{Channel, ConnectionStatus};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::connection::ReconnectPolicy;
use crate::error::TransportError;
use crate::manager::{ConnectionId, TransportEvent, TransportEventKind};
use crate::{TransportResult, ABNORMAL_CLOSE_CODE, NORMAL_CLOSE_CODE};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on a single opening handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Close code a peer reports by sending a close frame without a status.
const NO_STATUS_CODE: u16 = 1005;

/// Requests from the manager to its worker.
#[derive(Debug)]
pub(crate) enum Control {
    /// Close one connection. Ignored unless it is the current one.
    Close {
        id: ConnectionId,
        code: u16,
        reason: String,
    },

    /// Close whatever is open and exit.
    Stop,
}

/// How a live connection ended.
enum Ended {
    /// Closed from this side; the worker exits.
    Local { code: u16, reason: String },

    /// Closed by the peer or broken.
    Remote { code: u16, reason: String },
}

/// State shared between a manager and its worker thread.
pub(crate) struct Worker {
    pub channel: Channel,
    pub url: Url,
    pub origin: HeaderValue,
    pub policy: ReconnectPolicy,
    pub events: Sender<TransportEvent>,
    pub status: Arc<RwLock<ConnectionStatus>>,
    pub intent: Arc<AtomicBool>,
    pub current: Arc<AtomicU64>,
}

impl Worker {
    /// Drive connections until closed, stopped, or out of reconnect attempts.
    pub(crate) async fn run(self, first: ConnectionId, mut control: UnboundedReceiver<Control>) {
        let mut id = first;
        let mut attempt = 0u32;
        let mut established = false;

        loop {
            self.current.store(id.value(), Ordering::SeqCst);
            self.set_status(ConnectionStatus::Connecting);

            let opened = tokio::select! {
                result = self.open() => result,
                (code, reason) = stop_requested(&mut control, id) => {
                    debug!(channel = %self.channel, %id, "Closed while connecting");
                    self.set_status(ConnectionStatus::Closed);
                    self.emit(id, TransportEventKind::Closed { code, reason });
                    return;
                }
            };

            let mut ws = match opened {
                Ok(ws) => ws,
                Err(e) if !established => {
                    // The first connection of a connect() call is never retried.
                    warn!(channel = %self.channel, %id, error = %e, "Connection failed");
                    self.fail(id, e.to_string());
                    return;
                }
                Err(e) => {
                    warn!(channel = %self.channel, %id, attempt, error = %e, "Reconnect attempt failed");
                    if !self.backoff(&mut control, id, &mut attempt).await {
                        return;
                    }
                    id = ConnectionId::next();
                    continue;
                }
            };

            established = true;
            let opened_at = Instant::now();
            info!(channel = %self.channel, %id, host = self.url.host_str().unwrap_or(""), "Connection open");
            self.set_status(ConnectionStatus::Open);
            self.emit(id, TransportEventKind::Opened);

            match self.pump(&mut ws, &mut control, id).await {
                Ended::Local { code, reason } => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    if let Err(e) = ws.close(Some(frame)).await {
                        debug!(channel = %self.channel, %id, error = %e, "Close handshake failed");
                    }
                    info!(channel = %self.channel, %id, code, "Connection closed");
                    self.set_status(ConnectionStatus::Closed);
                    self.emit(id, TransportEventKind::Closed { code, reason });
                    return;
                }
                Ended::Remote { code, reason } => {
                    let reconnect =
                        code != NORMAL_CLOSE_CODE && self.intent.load(Ordering::SeqCst);
                    if code == NORMAL_CLOSE_CODE {
                        info!(channel = %self.channel, %id, "Connection closed by server");
                    } else {
                        warn!(channel = %self.channel, %id, code, reason = %reason, "Connection closed abnormally");
                    }
                    if !reconnect {
                        self.set_status(ConnectionStatus::Closed);
                    }
                    self.emit(id, TransportEventKind::Closed { code, reason });
                    if !reconnect {
                        return;
                    }

                    if self.policy.is_stable(opened_at.elapsed()) {
                        attempt = 0;
                    }
                    if !self.backoff(&mut control, id, &mut attempt).await {
                        return;
                    }
                    id = ConnectionId::next();
                }
            }
        }
    }

    async fn open(&self) -> TransportResult<WsStream> {
        let mut request = self.url.as_str().into_client_request()?;
        request.headers_mut().insert(ORIGIN, self.origin.clone());

        let (ws, response) = tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| TransportError::ConnectionFailed("handshake timed out".to_string()))??;

        debug!(channel = %self.channel, status = %response.status(), "Handshake complete");
        Ok(ws)
    }

    /// Forward frames until the connection ends.
    async fn pump(
        &self,
        ws: &mut WsStream,
        control: &mut UnboundedReceiver<Control>,
        id: ConnectionId,
    ) -> Ended {
        loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.emit(id, TransportEventKind::Message { text });
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => self.emit(id, TransportEventKind::Message { text }),
                        Err(_) => debug!(channel = %self.channel, "Dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.into_owned()))
                            .unwrap_or((NO_STATUS_CODE, String::new()));
                        return Ended::Remote { code, reason };
                    }
                    Some(Ok(other)) => {
                        trace!(channel = %self.channel, ?other, "Control frame");
                    }
                    Some(Err(e)) => {
                        return Ended::Remote {
                            code: ABNORMAL_CLOSE_CODE,
                            reason: e.to_string(),
                        };
                    }
                    None => {
                        return Ended::Remote {
                            code: ABNORMAL_CLOSE_CODE,
                            reason: "stream ended".to_string(),
                        };
                    }
                },
                (code, reason) = stop_requested(control, id) => {
                    return Ended::Local { code, reason };
                }
            }
        }
    }

    /// Count an attempt and wait out its delay. Returns false when the worker
    /// should exit instead of reconnecting.
    async fn backoff(
        &self,
        control: &mut UnboundedReceiver<Control>,
        id: ConnectionId,
        attempt: &mut u32,
    ) -> bool {
        *attempt += 1;
        if !self.policy.should_retry(*attempt) {
            let reason = TransportError::ReconnectExhausted(*attempt - 1).to_string();
            warn!(channel = %self.channel, "{}", reason);
            self.fail(id, reason);
            return false;
        }

        let delay = self.policy.delay_for_attempt(*attempt);
        info!(channel = %self.channel, attempt = *attempt, ?delay, "Reconnecting");
        self.set_status(ConnectionStatus::Connecting);
        self.emit(
            id,
            TransportEventKind::Reconnecting {
                attempt: *attempt,
                delay,
            },
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop_requested(control, id) => {
                self.set_status(ConnectionStatus::Closed);
                return false;
            }
        }

        if !self.intent.load(Ordering::SeqCst) {
            self.set_status(ConnectionStatus::Closed);
            return false;
        }
        true
    }

    /// Mark the channel failed for good.
    pub(crate) fn fail(&self, id: ConnectionId, reason: String) {
        self.set_status(ConnectionStatus::Failed {
            reason: reason.clone(),
        });
        self.emit(id, TransportEventKind::Failed { reason });
    }

    fn set_status(&self, status: ConnectionStatus) {
        *self.status.write() = status;
    }

    fn emit(&self, connection: ConnectionId, kind: TransportEventKind) {
        let event = TransportEvent {
            channel: self.channel,
            connection,
            kind,
        };
        if self.events.send(event).is_err() {
            trace!(channel = %self.channel, "Event receiver dropped");
        }
    }
}

/// Resolve once the given connection has to stop.
async fn stop_requested(
    control: &mut UnboundedReceiver<Control>,
    id: ConnectionId,
) -> (u16, String) {
    loop {
        match control.recv().await {
            Some(Control::Close {
                id: target,
                code,
                reason,
            }) if target == id => return (code, reason),
            Some(Control::Close { id: target, .. }) => {
                trace!(%target, "Ignoring close for stale connection");
            }
            Some(Control::Stop) | None => {
                return (NORMAL_CLOSE_CODE, "shutdown".to_string());
            }
        }
    }
}
