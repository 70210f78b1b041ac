//! Conversation-level events: list-and-join and soft-leave.

use crate::error::GatewayError;
use crate::state::AppState;
use crate::store;
use crate::ws::broadcast::send_event;
use crate::ws::events::{DeleteConversationPayload, ServerEvent};
use crate::ws::ConnectionSender;

/// request-all-conversations: reply with the caller's active conversations
/// and, as a side effect, join the room of every conversation they were ever
/// a member of — soft-left conversations keep receiving room broadcasts for
/// the history the user can still see.
pub async fn handle_request_all(
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    let db = state.db.clone();
    let uid = user_id.to_string();
    let (visible, joinable) =
        tokio::task::spawn_blocking(move || -> Result<_, GatewayError> {
            let conn = store::lock(&db)?;
            let visible = store::conversations::get_by_user_id(&conn, &uid)?;
            let joinable = store::conversations::get_by_user_id_including_left(&conn, &uid)?;
            Ok((visible, joinable))
        })
        .await??;

    for conversation in &joinable {
        state.rooms.join(&conversation.id, user_id);
    }

    send_event(
        tx,
        &ServerEvent::SendAllConversations {
            conversations: visible,
        },
    );
    Ok(())
}

/// request-delete-conversation: soft-leave, close the conversation if nobody
/// is left, and reply with the caller's refreshed list. The caller also
/// leaves the room.
pub async fn handle_delete(
    payload: DeleteConversationPayload,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    let db = state.db.clone();
    let uid = user_id.to_string();
    let conversation_id = payload.conversation_id.clone();

    let conversations = tokio::task::spawn_blocking(move || -> Result<_, GatewayError> {
        let conn = store::lock(&db)?;
        store::participants::mark_left(&conn, &conversation_id, &uid)?;
        store::conversations::close_if_empty(&conn, &conversation_id)?;
        store::conversations::get_by_user_id(&conn, &uid)
    })
    .await??;

    state.rooms.leave(&payload.conversation_id, user_id);

    send_event(tx, &ServerEvent::SendDeleteConversation { conversations });
    Ok(())
}
