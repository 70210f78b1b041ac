//! Inbound frame dispatch: decode the JSON envelope, route to the handler for
//! its event kind, and surface any failure as an `error` event to the
//! originating connection only.

use crate::call::signaling;
use crate::chat::{conversations, messages};
use crate::error::GatewayError;
use crate::matchmaking;
use crate::state::AppState;
use crate::ws::broadcast::send_event;
use crate::ws::events::{ClientEvent, ServerEvent};
use crate::ws::ConnectionSender;

/// Handle one incoming text frame from an authenticated connection.
pub async fn handle_text_message(
    text: &str,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(user_id = %user_id, error = %err, "Failed to decode client event");
            send_error(tx, 400, "invalid event payload");
            return;
        }
    };

    if let Err(err) = dispatch(event, tx, state, user_id).await {
        tracing::warn!(
            user_id = %user_id,
            code = err.code(),
            error = %err,
            "Event handler failed"
        );
        send_error(tx, err.code(), &err.to_string());
    }
}

async fn dispatch(
    event: ClientEvent,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    match event {
        ClientEvent::RequestAllConversations => {
            conversations::handle_request_all(tx, state, user_id).await
        }
        ClientEvent::RequestDeleteConversation(payload) => {
            conversations::handle_delete(payload, tx, state, user_id).await
        }
        ClientEvent::RequestAllMessages(payload) => {
            messages::handle_request_all(payload, tx, state, user_id).await
        }
        ClientEvent::RequestTyping(payload) => {
            messages::handle_typing(payload, state, user_id, true)
        }
        ClientEvent::RequestStopTyping(payload) => {
            messages::handle_typing(payload, state, user_id, false)
        }
        ClientEvent::RequestSendMessage(payload) => {
            messages::handle_send(payload, state, user_id).await
        }
        ClientEvent::RequestUpdateMessage(payload) => {
            messages::handle_update(payload, state, user_id).await
        }
        ClientEvent::RequestDeleteMessage(payload) => {
            messages::handle_delete(payload, tx, state, user_id).await
        }
        ClientEvent::CallInit(payload) => signaling::handle_init(payload, tx, state, user_id).await,
        ClientEvent::CallAccepted(payload) => {
            signaling::handle_accepted(payload, tx, state, user_id).await
        }
        ClientEvent::CallRejected(payload) => {
            signaling::handle_rejected(payload, state, user_id).await
        }
        ClientEvent::CallHangup(payload) => {
            signaling::handle_hangup(payload, tx, state, user_id)
        }
        ClientEvent::ToggleMic(payload) => signaling::handle_toggle_mic(payload, state),
        ClientEvent::CreateUserMatch(payload) => {
            matchmaking::handle_create(payload, tx, state, user_id).await
        }
    }
}

fn send_error(tx: &ConnectionSender, code: u32, message: &str) {
    send_event(
        tx,
        &ServerEvent::Error {
            code,
            message: message.to_string(),
        },
    );
}
