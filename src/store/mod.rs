//! Conversation store adapter: the narrow durable-state contract the gateway
//! depends on. Synchronous rusqlite functions, always called from
//! tokio::task::spawn_blocking with the shared connection locked.

pub mod conversations;
pub mod matches;
pub mod messages;
pub mod participants;
pub mod users;

use std::sync::MutexGuard;

use chrono::Utc;
use rusqlite::Connection;

use crate::db::DbPool;
use crate::error::GatewayError;

/// Lock the shared connection, mapping poisoning to a store error.
pub fn lock(db: &DbPool) -> Result<MutexGuard<'_, Connection>, GatewayError> {
    db.lock()
        .map_err(|_| GatewayError::Store("database lock poisoned".to_string()))
}

/// Timestamp format shared by every table: RFC 3339 in UTC. Lexicographic
/// order matches chronological order within this format.
pub fn now() -> String {
    Utc::now().to_rfc3339()
}
