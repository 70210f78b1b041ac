use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::auth::jwt;
use crate::state::AppState;
use crate::ws::actor;

/// Auth travels as a query parameter on the upgrade request; connections are
/// accepted or refused at handshake, never per-event.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: String,
}

/// Connection replaced by a newer one for the same user.
pub const CLOSE_REPLACED: u16 = 4000;
/// Presented token has expired.
const CLOSE_TOKEN_EXPIRED: u16 = 4001;
/// Presented token failed validation.
const CLOSE_TOKEN_INVALID: u16 = 4002;

/// GET /ws?token=JWT
///
/// A failed validation still completes the upgrade so the close code reaches
/// the client, then shuts the socket immediately.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match jwt::validate_access_token(&state.jwt_secret, &query.token) {
        Ok(claims) => {
            tracing::info!(user_id = %claims.sub, "WebSocket connection authenticated");
            ws.on_upgrade(move |socket| actor::run_connection(socket, state, claims.sub))
        }
        Err(err) => {
            let (code, reason) = match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    (CLOSE_TOKEN_EXPIRED, "Token expired")
                }
                _ => (CLOSE_TOKEN_INVALID, "Token invalid"),
            };
            tracing::warn!(code, reason, "WebSocket auth failed");
            ws.on_upgrade(move |socket| refuse(socket, code, reason))
        }
    }
}

async fn refuse(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
