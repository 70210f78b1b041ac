//! In-memory connection and room registries. The only shared mutable state in
//! the gateway; DashMaps keep registration/lookup safe across connection
//! lifecycles without a global lock.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::ws::ConnectionSender;

/// Maps a user id to their single live connection. Last-connect-wins: a new
/// registration replaces (and reports) any previous connection for the user.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionSender>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate the user with a connection, returning the replaced sender if
    /// the user was already connected elsewhere.
    pub fn register(&self, user_id: &str, tx: ConnectionSender) -> Option<ConnectionSender> {
        self.connections.insert(user_id.to_string(), tx)
    }

    /// Remove the association, but only if the stored sender still belongs to
    /// this connection — a replaced connection's cleanup must not evict its
    /// replacement.
    pub fn unregister_if_current(&self, user_id: &str, tx: &ConnectionSender) -> bool {
        self.connections
            .remove_if(user_id, |_, current| current.same_channel(tx))
            .is_some()
    }

    /// The user's current connection, or None when offline. Absence is a
    /// normal outcome on every delivery path, never an error.
    pub fn lookup(&self, user_id: &str) -> Option<ConnectionSender> {
        self.connections.get(user_id).map(|entry| entry.clone())
    }

    /// Every live connection, for best-effort broadcast paths.
    pub fn list_all(&self) -> Vec<ConnectionSender> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Conversation rooms: which users are subscribed to a conversation's
/// broadcast scope. Membership follows the connection lifecycle, not the
/// durable participant rows — soft-left members keep their room subscription
/// until they disconnect.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, conversation_id: &str, user_id: &str) {
        self.rooms
            .entry(conversation_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    pub fn leave(&self, conversation_id: &str, user_id: &str) {
        let mut drop_room = false;
        if let Some(mut members) = self.rooms.get_mut(conversation_id) {
            members.remove(user_id);
            drop_room = members.is_empty();
        }
        if drop_room {
            self.rooms.remove(conversation_id);
        }
    }

    /// Remove the user from every room. Disconnect cleanup.
    pub fn leave_all(&self, user_id: &str) {
        self.rooms.retain(|_, members| {
            members.remove(user_id);
            !members.is_empty()
        });
    }

    pub fn members(&self, conversation_id: &str) -> Vec<String> {
        self.rooms
            .get(conversation_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }
}
