//! Websocket streaming channels.
//!
//! Each [`ConnectionManager`] owns one logical channel of a studio. The
//! connection runs on a dedicated worker thread and reports everything that
//! happens to it as [`TransportEvent`]s.

mod connection;
mod error;
mod manager;
mod websocket;

pub use connection::ReconnectPolicy;
pub use error::TransportError;
pub use manager::{ConnectionId, ConnectionManager, TransportEvent, TransportEventKind};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Close code of an orderly shutdown. Any other code is abnormal.
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Close code reported when the stream ended without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;
