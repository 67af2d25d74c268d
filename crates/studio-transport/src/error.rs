//! Error types for the transport module.

use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Invalid websocket URL.
    #[error("Invalid websocket URL: {0}")]
    InvalidUrl(String),

    /// Invalid header value (e.g. the configured origin).
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Handshake with the server failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Reconnect exhausted.
    #[error("Reconnect attempts exhausted after {0} attempts")]
    ReconnectExhausted(u32),

    /// Not connected, or the connection id is no longer current.
    #[error("Not connected")]
    NotConnected,

    /// Already connected.
    #[error("Already connected")]
    AlreadyConnected,

    /// The worker thread is gone.
    #[error("Channel disconnected")]
    ChannelDisconnected,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Websocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
