pub mod actor;
pub mod broadcast;
pub mod events;
pub mod handler;
pub mod protocol;
pub mod registry;

use tokio::sync::mpsc;

/// Sender half of a WebSocket connection's channel. Any part of the system
/// can clone this to push frames to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;
