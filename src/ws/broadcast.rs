//! Delivery helpers: serialize a server event once and fan it out. Missing
//! connections deliver to zero recipients — never an error.

use axum::extract::ws::Message;

use crate::state::AppState;
use crate::ws::events::ServerEvent;
use crate::ws::registry::ConnectionRegistry;
use crate::ws::ConnectionSender;

fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(err) => {
            tracing::error!(error = %err, "Failed to encode server event");
            None
        }
    }
}

/// Push an event down one connection. Send failures mean the connection is
/// already closing; the actor's cleanup handles the rest.
pub fn send_event(tx: &ConnectionSender, event: &ServerEvent) {
    if let Some(msg) = encode(event) {
        let _ = tx.send(msg);
    }
}

/// Deliver to a specific user if they are connected.
pub fn send_to_user(registry: &ConnectionRegistry, user_id: &str, event: &ServerEvent) {
    let Some(msg) = encode(event) else { return };
    if let Some(tx) = registry.lookup(user_id) {
        let _ = tx.send(msg);
    }
}

/// Deliver to every connection joined to a conversation's room.
pub fn broadcast_room(state: &AppState, conversation_id: &str, event: &ServerEvent) {
    let Some(msg) = encode(event) else { return };
    for member in state.rooms.members(conversation_id) {
        if let Some(tx) = state.connections.lookup(&member) {
            let _ = tx.send(msg.clone());
        }
    }
}

/// Room delivery that skips the emitting user (typing indicators must not
/// echo back to their source).
pub fn broadcast_room_except(
    state: &AppState,
    conversation_id: &str,
    except_user_id: &str,
    event: &ServerEvent,
) {
    let Some(msg) = encode(event) else { return };
    for member in state.rooms.members(conversation_id) {
        if member == except_user_id {
            continue;
        }
        if let Some(tx) = state.connections.lookup(&member) {
            let _ = tx.send(msg.clone());
        }
    }
}
