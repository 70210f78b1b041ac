pub mod signaling;
pub mod state;
