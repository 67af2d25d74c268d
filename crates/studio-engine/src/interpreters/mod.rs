//! Per-channel payload interpreters.
//!
//! Each channel's messages are applied by an `on_*` method on
//! [`StudioCore`](crate::StudioCore).

mod devices;
mod meters;
mod server;
mod subscriptions;

pub use meters::db_to_linear;
