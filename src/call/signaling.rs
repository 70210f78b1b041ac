//! Call-signaling handlers. Only the handshake lives here — media transport
//! is peer-to-peer and outside the gateway. All notifications are
//! best-effort: a missing peer connection never errors beyond the explicit
//! `user-unavailable` on init.

use crate::db::models::UserRef;
use crate::error::GatewayError;
use crate::state::AppState;
use crate::store;
use crate::ws::broadcast::{broadcast_room, send_event, send_to_user};
use crate::ws::events::{
    CallAcceptedPayload, CallHangupPayload, CallInitPayload, CallRejectedPayload, ServerEvent,
    ToggleMicPayload,
};
use crate::ws::ConnectionSender;

async fn load_user_ref(state: &AppState, user_id: &str) -> Result<UserRef, GatewayError> {
    let db = state.db.clone();
    let uid = user_id.to_string();
    tokio::task::spawn_blocking(move || {
        let conn = store::lock(&db)?;
        store::users::get(&conn, &uid)
    })
    .await?
}

/// call-init: ring the receiver if connected. If absent, wait the grace delay
/// and re-read the registry exactly once — a receiver that connected during
/// the window gets the call; otherwise the caller hears `user-unavailable`.
pub async fn handle_init(
    payload: CallInitPayload,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    let caller = load_user_ref(state, user_id).await?;

    match state.connections.lookup(&payload.receiver_id) {
        Some(receiver_tx) => {
            ring(state, &receiver_tx, &payload, caller);
        }
        None => {
            let state = state.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(state.call_grace).await;
                match state.connections.lookup(&payload.receiver_id) {
                    Some(receiver_tx) => ring(&state, &receiver_tx, &payload, caller),
                    None => send_event(&tx, &ServerEvent::UserUnavailable),
                }
            });
        }
    }
    Ok(())
}

fn ring(state: &AppState, receiver_tx: &ConnectionSender, payload: &CallInitPayload, caller: UserRef) {
    state.calls.ring(
        &caller.id,
        &payload.receiver_id,
        &payload.conversation_id,
        payload.call_kind,
    );
    tracing::info!(
        caller = %caller.id,
        receiver = %payload.receiver_id,
        kind = ?payload.call_kind,
        "Call ringing"
    );
    send_event(
        receiver_tx,
        &ServerEvent::CallIncoming {
            conversation_id: payload.conversation_id.clone(),
            receiver_id: payload.receiver_id.clone(),
            caller,
            call_kind: payload.call_kind,
        },
    );
}

/// call-accepted: requires an existing private conversation between the
/// parties and a ringing session. Both sides are notified with both
/// identities so either can render the remote-party label.
pub async fn handle_accepted(
    payload: CallAcceptedPayload,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    let db = state.db.clone();
    let caller_id = payload.caller.clone();
    let uid = user_id.to_string();

    let (conversation, caller, acceptor) =
        tokio::task::spawn_blocking(move || -> Result<_, GatewayError> {
            let conn = store::lock(&db)?;
            let conversation =
                store::conversations::find_private_between(&conn, &caller_id, &uid)?;
            let caller = store::users::get(&conn, &caller_id)?;
            let acceptor = store::users::get(&conn, &uid)?;
            Ok((conversation, caller, acceptor))
        })
        .await??;

    if conversation.is_none() {
        return Err(GatewayError::NotFound("conversation not found".to_string()));
    }

    state.calls.accept(&payload.caller, user_id)?;

    if let Some(caller_tx) = state.connections.lookup(&payload.caller) {
        let event = ServerEvent::CallAccepted { acceptor, caller };
        send_event(&caller_tx, &event);
        send_event(tx, &event);
    }
    Ok(())
}

/// call-rejected: the caller is notified if still connected; the rejecting
/// side gets no echo.
pub async fn handle_rejected(
    payload: CallRejectedPayload,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    state.calls.reject(&payload.caller, user_id)?;
    let receiver = load_user_ref(state, user_id).await?;
    send_to_user(
        &state.connections,
        &payload.caller,
        &ServerEvent::CallRejected { receiver },
    );
    Ok(())
}

/// toggle-mic: room-wide broadcast (emitter included) of whose mic changed.
pub fn handle_toggle_mic(payload: ToggleMicPayload, state: &AppState) -> Result<(), GatewayError> {
    broadcast_room(
        state,
        &payload.conversation_id,
        &ServerEvent::MicToggled {
            user_id_disable_mic: payload.user_id_disable_mic,
        },
    );
    Ok(())
}

/// call-hangup: symmetric. The hanging-up side always gets a self-echo; the
/// peer is notified if connected. Session removal is idempotent — the other
/// side may have hung up (or disconnected) concurrently.
pub fn handle_hangup(
    payload: CallHangupPayload,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    let _ = state.calls.hang_up(&payload.caller, &payload.receiver);

    send_event(tx, &ServerEvent::CallHangup);

    let peer = if user_id == payload.caller {
        &payload.receiver
    } else {
        &payload.caller
    };
    send_to_user(&state.connections, peer, &ServerEvent::CallHangup);
    Ok(())
}
