use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::call::state::CallRegistry;
use crate::db::DbPool;
use crate::ws::registry::{ConnectionRegistry, RoomRegistry};

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Active WebSocket connection per user (last-connect-wins)
    pub connections: Arc<ConnectionRegistry>,
    /// Conversation rooms: broadcast scopes per conversation
    pub rooms: Arc<RoomRegistry>,
    /// In-flight call sessions keyed by (caller, receiver)
    pub calls: Arc<CallRegistry>,
    /// Grace delay before declaring a call receiver unavailable
    pub call_grace: Duration,
    /// Per-conversation mutual exclusion for last-message recomputation.
    /// Send/update/delete are read-modify-write across messages and the
    /// conversation snapshot and must serialize per conversation.
    conversation_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl AppState {
    pub fn new(db: DbPool, jwt_secret: Vec<u8>, call_grace: Duration) -> Self {
        Self {
            db,
            jwt_secret,
            connections: Arc::new(ConnectionRegistry::new()),
            rooms: Arc::new(RoomRegistry::new()),
            calls: Arc::new(CallRegistry::new()),
            call_grace,
            conversation_locks: Arc::new(DashMap::new()),
        }
    }

    /// The mutex serializing message mutations for one conversation.
    pub fn conversation_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        self.conversation_locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    /// Evict the lock entry if no handler currently holds a reference to it.
    /// Callers drop their clone first; the map must not grow one entry per
    /// conversation ever touched. The strong-count check runs under the shard
    /// lock, so a concurrent `conversation_lock` either keeps the entry alive
    /// or gets a fresh one after removal. Eviction is opportunistic: a
    /// handler erroring out skips it, and the next mutation on that
    /// conversation cleans up.
    pub fn release_conversation_lock(&self, conversation_id: &str) {
        self.conversation_locks
            .remove_if(conversation_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
