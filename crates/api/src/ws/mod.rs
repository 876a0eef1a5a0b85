//! WebSocket side of the coordinator.
//!
//! Provides the display connection registry, heartbeat monitoring, and the
//! HTTP upgrade handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod hub;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use hub::{BroadcastHub, DisplayConnection};
