//! Message events: list, typing indicators, and the send/update/delete
//! mutations that maintain the conversation's last-message snapshot.
//!
//! Every mutation is a read-modify-write across the message set and the
//! conversation row, so each runs under the per-conversation lock; room and
//! targeted fan-out happens after the store settles, from the freshest state.

use crate::error::GatewayError;
use crate::state::AppState;
use crate::store;
use crate::store::messages::NewMessage;
use crate::ws::broadcast::{broadcast_room, broadcast_room_except, send_event, send_to_user};
use crate::ws::events::{
    DeleteMessagePayload, GetMessagesPayload, SendMessagePayload, ServerEvent, TypingPayload,
    UpdateMessagePayload,
};
use crate::ws::ConnectionSender;

/// request-all-messages: conversation, per-user message list, and the two
/// derived roles (caller = sender participant, first other active member =
/// receiver participant).
pub async fn handle_request_all(
    payload: GetMessagesPayload,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    let db = state.db.clone();
    let uid = user_id.to_string();
    let conversation_id = payload.conversation_id.clone();

    let (conversation, participants, messages) =
        tokio::task::spawn_blocking(move || -> Result<_, GatewayError> {
            let conn = store::lock(&db)?;
            let conversation = store::conversations::get_by_id(&conn, &conversation_id)?
                .ok_or_else(|| GatewayError::NotFound("conversation not found".to_string()))?;
            let participants =
                store::participants::get_by_conversation_id(&conn, &conversation_id)?;
            let messages =
                store::messages::list_by_conversation_and_user(&conn, &conversation_id, &uid)?;
            Ok((conversation, participants, messages))
        })
        .await??;

    let sender_participant = participants.iter().find(|p| p.user_id == user_id).cloned();
    let receiver_participant = participants.iter().find(|p| p.user_id != user_id).cloned();

    send_event(
        tx,
        &ServerEvent::SendAllMessages {
            conversation,
            messages,
            sender_participant,
            receiver_participant,
        },
    );
    Ok(())
}

/// request-typing / request-stop-typing: fire-and-forget room broadcast that
/// never echoes back to the emitter. No persistence.
pub fn handle_typing(
    payload: TypingPayload,
    state: &AppState,
    user_id: &str,
    started: bool,
) -> Result<(), GatewayError> {
    let event = if started {
        ServerEvent::SendTyping {
            conversation_id: payload.conversation_id.clone(),
        }
    } else {
        ServerEvent::SendStopTyping {
            conversation_id: payload.conversation_id.clone(),
        }
    };
    broadcast_room_except(state, &payload.conversation_id, user_id, &event);
    Ok(())
}

/// request-send-message: validate, persist, advance the last-message
/// snapshot, and broadcast to the whole room — including the sender, for
/// optimistic-UI reconciliation.
pub async fn handle_send(
    payload: SendMessagePayload,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    let content = payload.content.unwrap_or_default();
    let attachments = payload.attachments.unwrap_or_default();
    if content.trim().is_empty() && attachments.is_empty() {
        return Err(GatewayError::Validation(
            "message can't be empty".to_string(),
        ));
    }

    let lock = state.conversation_lock(&payload.conversation_id);
    let _guard = lock.lock().await;

    let db = state.db.clone();
    let conversation_id = payload.conversation_id.clone();
    let sender_participant_id = payload.sender_participant_id.clone();
    let reply_to = payload.reply_to.clone();

    let (message, conversation_updated) =
        tokio::task::spawn_blocking(move || -> Result<_, GatewayError> {
            let conn = store::lock(&db)?;
            store::conversations::get_by_id(&conn, &conversation_id)?
                .ok_or_else(|| GatewayError::NotFound("conversation not found".to_string()))?;
            let message = store::messages::create(
                &conn,
                NewMessage {
                    conversation_id: conversation_id.clone(),
                    sender_participant_id,
                    content,
                    reply_to,
                    attachments,
                },
            )?;
            let conversation_updated =
                store::conversations::update_last_message(&conn, &conversation_id, &message.id)?;
            Ok((message, conversation_updated))
        })
        .await??;

    tracing::debug!(
        user_id = %user_id,
        conversation_id = %payload.conversation_id,
        message_id = %message.id,
        "Message stored"
    );

    broadcast_room(
        state,
        &payload.conversation_id,
        &ServerEvent::SendMessage {
            message,
            conversation_updated,
        },
    );

    drop(_guard);
    drop(lock);
    state.release_conversation_lock(&payload.conversation_id);
    Ok(())
}

/// request-update-message: persist the edit; the conversation snapshot is
/// refreshed only when the edited message is the current last message.
pub async fn handle_update(
    payload: UpdateMessagePayload,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    let lock = state.conversation_lock(&payload.conversation_id);
    let _guard = lock.lock().await;

    let db = state.db.clone();
    let conversation_id = payload.conversation_id.clone();
    let message_id = payload.message_id.clone();
    let content = payload.content.clone();

    let (message, conversation_updated) =
        tokio::task::spawn_blocking(move || -> Result<_, GatewayError> {
            let conn = store::lock(&db)?;
            let conversation = store::conversations::get_by_id(&conn, &conversation_id)?
                .ok_or_else(|| GatewayError::NotFound("conversation not found".to_string()))?;
            let message = store::messages::update(&conn, &message_id, &content)?;

            let is_last_message = conversation
                .last_message
                .as_ref()
                .is_some_and(|last| last.id == message_id);
            let conversation_updated = if is_last_message {
                Some(store::conversations::update_last_message(
                    &conn,
                    &conversation_id,
                    &message_id,
                )?)
            } else {
                None
            };
            Ok((message, conversation_updated))
        })
        .await??;

    tracing::debug!(
        user_id = %user_id,
        message_id = %payload.message_id,
        snapshot_refreshed = conversation_updated.is_some(),
        "Message updated"
    );

    broadcast_room(
        state,
        &payload.conversation_id,
        &ServerEvent::SendUpdateMessage {
            message,
            conversation_updated,
        },
    );

    drop(_guard);
    drop(lock);
    state.release_conversation_lock(&payload.conversation_id);
    Ok(())
}

/// request-delete-message: soft-delete and, when the victim was the current
/// last message, recompute the snapshot to the newest remaining message or
/// clear it when none remain. Delivery is targeted (caller + counterpart),
/// not room-broadcast: the visible message list differs per participant.
pub async fn handle_delete(
    payload: DeleteMessagePayload,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    let lock = state.conversation_lock(&payload.conversation_id);
    let _guard = lock.lock().await;

    let db = state.db.clone();
    let uid = user_id.to_string();
    let conversation_id = payload.conversation_id.clone();
    let message_id = payload.message_id.clone();

    let (messages, conversation_updated) =
        tokio::task::spawn_blocking(move || -> Result<_, GatewayError> {
            let conn = store::lock(&db)?;
            let conversation = store::conversations::get_by_id(&conn, &conversation_id)?
                .ok_or_else(|| GatewayError::NotFound("conversation not found".to_string()))?;
            store::messages::soft_delete(&conn, &message_id)?;
            let messages =
                store::messages::list_by_conversation_and_user(&conn, &conversation_id, &uid)?;

            let was_last_message = conversation
                .last_message
                .as_ref()
                .is_some_and(|last| last.id == message_id);
            let conversation_updated = if was_last_message {
                Some(match messages.first() {
                    Some(newest) => store::conversations::update_last_message(
                        &conn,
                        &conversation_id,
                        &newest.id,
                    )?,
                    None => store::conversations::clear_last_message(&conn, &conversation_id)?,
                })
            } else {
                None
            };
            Ok((messages, conversation_updated))
        })
        .await??;

    let event = ServerEvent::SendDeleteMessage {
        messages,
        conversation_updated,
    };
    send_event(tx, &event);
    send_to_user(&state.connections, &payload.receiver_id, &event);

    drop(_guard);
    drop(lock);
    state.release_conversation_lock(&payload.conversation_id);
    Ok(())
}
