use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::state::AppState;
use crate::ws::handler::CLOSE_REPLACED;
use crate::ws::protocol;
use crate::ws::ConnectionSender;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// One actor per authenticated connection.
///
/// The socket splits in two: a writer task owns the sink and drains the mpsc
/// channel registered for this user, while this function runs the reader
/// loop. Keepalive pings ride the same channel; a pong that misses its
/// deadline tears the connection down so abrupt disconnects can't leak
/// registry entries.
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: String) {
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Last-connect-wins: the superseded connection is told why it is going
    // away so the older device doesn't sit deaf on a dead socket.
    if let Some(stale) = state.connections.register(&user_id, tx.clone()) {
        tracing::info!(user_id = %user_id, "Superseding existing connection");
        let _ = stale.send(Message::Close(Some(CloseFrame {
            code: CLOSE_REPLACED,
            reason: "Replaced by newer connection".into(),
        })));
    }

    tracing::info!(user_id = %user_id, "Connection actor started");
    let writer = tokio::spawn(drain_to_socket(sink, rx));

    read_until_closed(stream, &tx, &state, &user_id).await;

    writer.abort();

    // Runtime state tied to this connection goes away, but only if the
    // registry entry still belongs to us: a superseded connection's cleanup
    // must not evict its replacement. The replacement re-joins rooms on its
    // own conversation-list request.
    if state.connections.unregister_if_current(&user_id, &tx) {
        state.rooms.leave_all(&user_id);
        state.calls.drop_for_user(&user_id);
    }

    tracing::info!(user_id = %user_id, "Connection actor stopped");
}

/// Reader loop: dispatch inbound frames and enforce the ping/pong deadline.
async fn read_until_closed(
    mut stream: SplitStream<WebSocket>,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) {
    enum Wakeup {
        Frame(Option<Result<Message, axum::Error>>),
        PingDue,
        PongOverdue,
    }

    let mut keepalive = tokio::time::interval(PING_INTERVAL);
    keepalive.tick().await;
    let mut pong_due: Option<Instant> = None;

    loop {
        // Placeholder deadline is never polled: the branch is gated below.
        let deadline = pong_due.unwrap_or_else(Instant::now);
        let wakeup = tokio::select! {
            frame = stream.next() => Wakeup::Frame(frame),
            _ = keepalive.tick() => Wakeup::PingDue,
            _ = tokio::time::sleep_until(deadline), if pong_due.is_some() => Wakeup::PongOverdue,
        };

        let frame = match wakeup {
            Wakeup::Frame(frame) => frame,
            Wakeup::PingDue => {
                if tx.send(Message::Ping(Vec::new().into())).is_err() {
                    break;
                }
                pong_due = Some(Instant::now() + PONG_TIMEOUT);
                continue;
            }
            Wakeup::PongOverdue => {
                tracing::warn!(user_id = %user_id, "Pong deadline missed, closing");
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                protocol::handle_text_message(text.as_str(), tx, state, user_id).await;
            }
            Some(Ok(Message::Pong(_))) => {
                pong_due = None;
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = tx.send(Message::Pong(data));
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::debug!(user_id = %user_id, "Ignoring binary frame on JSON protocol");
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(user_id = %user_id, reason = ?frame, "Client closed connection");
                break;
            }
            Some(Err(err)) => {
                tracing::warn!(user_id = %user_id, error = %err, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }
}

/// Writer task: the only owner of the sink half. Everything the gateway wants
/// this client to see funnels through the mpsc channel.
async fn drain_to_socket(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if sink.send(msg).await.is_err() {
            break;
        }
    }
}
