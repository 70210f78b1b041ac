//! End-to-end gateway tests: a real server on an ephemeral port, JSON events
//! over tokio-tungstenite clients.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use amora_gateway::state::AppState;
use amora_gateway::store;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Start the gateway on a random port. Returns the bound address, the shared
/// state (for seeding and token issuance) and the temp-dir guard.
async fn start_test_server(call_grace: Duration) -> (SocketAddr, AppState, tempfile::TempDir) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = amora_gateway::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = amora_gateway::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = AppState::new(db, jwt_secret, call_grace);

    let app = amora_gateway::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, tmp_dir)
}

/// Seed two users and a private conversation between them. Returns
/// (conversation_id, participant_id_a, participant_id_b).
fn seed_private_conversation(state: &AppState, user_a: &str, user_b: &str) -> (String, String, String) {
    let conn = state.db.lock().unwrap();
    store::users::insert(&conn, user_a, user_a).unwrap();
    store::users::insert(&conn, user_b, user_b).unwrap();
    let conversation = store::conversations::create_private(&conn, user_a, user_b).unwrap();
    let participant_a = store::participants::get_for_user(&conn, &conversation.id, user_a)
        .unwrap()
        .unwrap();
    let participant_b = store::participants::get_for_user(&conn, &conversation.id, user_b)
        .unwrap()
        .unwrap();
    (conversation.id, participant_a.id, participant_b.id)
}

struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl TestClient {
    async fn connect(addr: SocketAddr, state: &AppState, user_id: &str) -> Self {
        let token =
            amora_gateway::auth::jwt::issue_access_token(&state.jwt_secret, user_id).unwrap();
        let url = format!("ws://{addr}/ws?token={token}");
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("WS connect failed");
        Self { ws }
    }

    async fn send(&mut self, event: Value) {
        self.ws
            .send(Message::Text(event.to_string().into()))
            .await
            .expect("WS send failed");
    }

    /// Next text event, skipping control frames. Panics on timeout.
    async fn next_event(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("Timed out waiting for event")
                .expect("Stream ended")
                .expect("WS error");
            match frame {
                Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("Unexpected frame: {other:?}"),
            }
        }
    }

    /// Assert the next event carries the expected name and return its data.
    async fn expect_event(&mut self, name: &str) -> Value {
        let event = self.next_event().await;
        assert_eq!(event["event"], name, "unexpected event: {event}");
        event.get("data").cloned().unwrap_or(Value::Null)
    }

    /// Assert nothing arrives within a short window (no-echo checks).
    async fn expect_silence(&mut self, window: Duration) {
        match tokio::time::timeout(window, self.ws.next()).await {
            Err(_) => {}
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
            Ok(other) => panic!("Expected silence, got: {other:?}"),
        }
    }

    /// Request the conversation list (joining rooms as a side effect) and
    /// consume the reply.
    async fn join_rooms(&mut self) -> Value {
        self.send(json!({"event": "request-all-conversations"})).await;
        self.expect_event("send-all-conversations").await
    }
}

#[tokio::test]
async fn invalid_token_closed_at_handshake() {
    let (addr, _state, _tmp) = start_test_server(Duration::from_millis(100)).await;

    let url = format!("ws://{addr}/ws?token=garbage");
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match frame {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4002),
        other => panic!("Expected close frame, got: {other:?}"),
    }
}

#[tokio::test]
async fn send_message_fans_out_and_updates_last_message() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, participant_a, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    let mut bob = TestClient::connect(addr, &state, "bob").await;
    let conversations = alice.join_rooms().await;
    assert_eq!(conversations["conversations"].as_array().unwrap().len(), 1);
    bob.join_rooms().await;

    alice
        .send(json!({
            "event": "request-send-message",
            "data": {
                "conversationId": conversation_id,
                "senderParticipantId": participant_a,
                "content": "hi"
            }
        }))
        .await;

    for client in [&mut alice, &mut bob] {
        let data = client.expect_event("send-message").await;
        assert_eq!(data["message"]["content"], "hi");
        assert_eq!(
            data["conversationUpdated"]["lastMessage"]["content"],
            "hi"
        );
    }
}

#[tokio::test]
async fn empty_message_rejected_with_validation_error() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, participant_a, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    alice.join_rooms().await;

    alice
        .send(json!({
            "event": "request-send-message",
            "data": {
                "conversationId": conversation_id,
                "senderParticipantId": participant_a,
                "content": "   "
            }
        }))
        .await;

    let data = alice.expect_event("error").await;
    assert_eq!(data["code"], 400);
    assert_eq!(data["message"], "message can't be empty");
}

#[tokio::test]
async fn attachment_only_message_accepted() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, participant_a, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    alice.join_rooms().await;

    alice
        .send(json!({
            "event": "request-send-message",
            "data": {
                "conversationId": conversation_id,
                "senderParticipantId": participant_a,
                "attachments": ["photo-1"]
            }
        }))
        .await;

    let data = alice.expect_event("send-message").await;
    assert_eq!(data["message"]["attachments"][0], "photo-1");
}

#[tokio::test]
async fn typing_reaches_room_but_never_echoes() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, _, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    let mut bob = TestClient::connect(addr, &state, "bob").await;
    alice.join_rooms().await;
    bob.join_rooms().await;

    alice
        .send(json!({
            "event": "request-typing",
            "data": {"conversationId": conversation_id}
        }))
        .await;

    let data = bob.expect_event("send-typing").await;
    assert_eq!(data["conversationId"], conversation_id);
    alice.expect_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn deleting_only_message_clears_last_message() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, participant_a, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    let mut bob = TestClient::connect(addr, &state, "bob").await;
    alice.join_rooms().await;
    bob.join_rooms().await;

    alice
        .send(json!({
            "event": "request-send-message",
            "data": {
                "conversationId": conversation_id,
                "senderParticipantId": participant_a,
                "content": "hi"
            }
        }))
        .await;
    let sent = alice.expect_event("send-message").await;
    bob.expect_event("send-message").await;
    let message_id = sent["message"]["id"].as_str().unwrap().to_string();

    alice
        .send(json!({
            "event": "request-delete-message",
            "data": {
                "messageId": message_id,
                "receiverId": "bob",
                "conversationId": conversation_id
            }
        }))
        .await;

    for client in [&mut alice, &mut bob] {
        let data = client.expect_event("send-delete-message").await;
        assert!(data["messages"].as_array().unwrap().is_empty());
        assert!(data["conversationUpdated"]["lastMessage"].is_null());
    }
}

#[tokio::test]
async fn deleting_last_message_recomputes_to_previous() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, participant_a, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    alice.join_rooms().await;

    let mut ids = Vec::new();
    for content in ["first", "second"] {
        alice
            .send(json!({
                "event": "request-send-message",
                "data": {
                    "conversationId": conversation_id,
                    "senderParticipantId": participant_a,
                    "content": content
                }
            }))
            .await;
        let sent = alice.expect_event("send-message").await;
        ids.push(sent["message"]["id"].as_str().unwrap().to_string());
    }

    alice
        .send(json!({
            "event": "request-delete-message",
            "data": {
                "messageId": ids[1],
                "receiverId": "bob",
                "conversationId": conversation_id
            }
        }))
        .await;

    let data = alice.expect_event("send-delete-message").await;
    assert_eq!(data["messages"].as_array().unwrap().len(), 1);
    assert_eq!(data["conversationUpdated"]["lastMessage"]["content"], "first");
}

#[tokio::test]
async fn editing_non_last_message_keeps_snapshot() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, participant_a, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    alice.join_rooms().await;

    let mut ids = Vec::new();
    for content in ["first", "second"] {
        alice
            .send(json!({
                "event": "request-send-message",
                "data": {
                    "conversationId": conversation_id,
                    "senderParticipantId": participant_a,
                    "content": content
                }
            }))
            .await;
        let sent = alice.expect_event("send-message").await;
        ids.push(sent["message"]["id"].as_str().unwrap().to_string());
    }

    // Editing the older message must not touch the snapshot
    alice
        .send(json!({
            "event": "request-update-message",
            "data": {
                "messageId": ids[0],
                "conversationId": conversation_id,
                "content": "first (edited)"
            }
        }))
        .await;
    let data = alice.expect_event("send-update-message").await;
    assert_eq!(data["message"]["isEdited"], true);
    assert!(data.get("conversationUpdated").is_none());

    // Editing the current last message refreshes it
    alice
        .send(json!({
            "event": "request-update-message",
            "data": {
                "messageId": ids[1],
                "conversationId": conversation_id,
                "content": "second (edited)"
            }
        }))
        .await;
    let data = alice.expect_event("send-update-message").await;
    assert_eq!(
        data["conversationUpdated"]["lastMessage"]["content"],
        "second (edited)"
    );
}

#[tokio::test]
async fn offline_callee_reports_unavailable_after_grace() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, _, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    alice.join_rooms().await;

    alice
        .send(json!({
            "event": "call-init",
            "data": {
                "receiverId": "bob",
                "conversationId": conversation_id,
                "callKind": "video"
            }
        }))
        .await;

    alice.expect_event("user-unavailable").await;
}

#[tokio::test]
async fn call_accept_notifies_both_sides() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, _, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    let mut bob = TestClient::connect(addr, &state, "bob").await;

    alice
        .send(json!({
            "event": "call-init",
            "data": {
                "receiverId": "bob",
                "conversationId": conversation_id,
                "callKind": "audio"
            }
        }))
        .await;

    let data = bob.expect_event("call-incoming").await;
    assert_eq!(data["caller"]["id"], "alice");
    assert_eq!(data["callKind"], "audio");

    bob.send(json!({
        "event": "call-accepted",
        "data": {"caller": "alice"}
    }))
    .await;

    for client in [&mut alice, &mut bob] {
        let data = client.expect_event("call-accepted").await;
        assert_eq!(data["caller"]["id"], "alice");
        assert_eq!(data["acceptor"]["id"], "bob");
    }
}

#[tokio::test]
async fn accept_without_ringing_call_is_rejected() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    seed_private_conversation(&state, "alice", "bob");

    let mut bob = TestClient::connect(addr, &state, "bob").await;
    bob.send(json!({
        "event": "call-accepted",
        "data": {"caller": "alice"}
    }))
    .await;

    let data = bob.expect_event("error").await;
    assert_eq!(data["code"], 409);
}

#[tokio::test]
async fn reject_notifies_caller_only() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, _, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    let mut bob = TestClient::connect(addr, &state, "bob").await;

    alice
        .send(json!({
            "event": "call-init",
            "data": {
                "receiverId": "bob",
                "conversationId": conversation_id,
                "callKind": "video"
            }
        }))
        .await;
    bob.expect_event("call-incoming").await;

    bob.send(json!({
        "event": "call-rejected",
        "data": {"caller": "alice"}
    }))
    .await;

    let data = alice.expect_event("call-rejected").await;
    assert_eq!(data["receiver"]["id"], "bob");
    bob.expect_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn call_hangup_echoes_self_and_notifies_peer() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, _, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    let mut bob = TestClient::connect(addr, &state, "bob").await;

    alice
        .send(json!({
            "event": "call-init",
            "data": {
                "receiverId": "bob",
                "conversationId": conversation_id,
                "callKind": "audio"
            }
        }))
        .await;
    bob.expect_event("call-incoming").await;
    bob.send(json!({
        "event": "call-accepted",
        "data": {"caller": "alice"}
    }))
    .await;
    alice.expect_event("call-accepted").await;
    bob.expect_event("call-accepted").await;

    alice
        .send(json!({
            "event": "call-hangup",
            "data": {"caller": "alice", "receiver": "bob"}
        }))
        .await;

    alice.expect_event("call-hangup").await;
    bob.expect_event("call-hangup").await;

    // The session is gone: hanging up again still self-echoes, the state
    // machine treats the repeat as benign
    alice
        .send(json!({
            "event": "call-hangup",
            "data": {"caller": "alice", "receiver": "bob"}
        }))
        .await;
    alice.expect_event("call-hangup").await;
}

#[tokio::test]
async fn mic_toggle_reaches_the_whole_room() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, _, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    let mut bob = TestClient::connect(addr, &state, "bob").await;
    alice.join_rooms().await;
    bob.join_rooms().await;

    alice
        .send(json!({
            "event": "toggle-mic",
            "data": {
                "conversationId": conversation_id,
                "userIdDisableMic": "alice"
            }
        }))
        .await;

    // Emitter included: everyone renders the same per-participant mic state
    for client in [&mut alice, &mut bob] {
        let data = client.expect_event("mic-toggled").await;
        assert_eq!(data["userIdDisableMic"], "alice");
    }
}

#[tokio::test]
async fn mutual_like_promotes_and_notifies_both() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    {
        let conn = state.db.lock().unwrap();
        store::users::insert(&conn, "alice", "Alice").unwrap();
        store::users::insert(&conn, "bob", "Bob").unwrap();
    }

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    let mut bob = TestClient::connect(addr, &state, "bob").await;

    // One-sided like: anonymized nudge only
    alice
        .send(json!({
            "event": "create-user-match",
            "data": {"userMatchId": "bob"}
        }))
        .await;
    let nudge = bob.next_event().await;
    assert_eq!(nudge["event"], "match-created");
    assert!(nudge.get("data").is_none() || nudge["data"].is_null());

    // Reciprocal like: both sides learn the identity
    bob.send(json!({
        "event": "create-user-match",
        "data": {"userMatchId": "alice"}
    }))
    .await;

    let data = alice.expect_event("user-matched").await;
    assert_eq!(data["userMatched"]["id"], "bob");
    let data = bob.expect_event("user-matched").await;
    assert_eq!(data["userMatched"]["id"], "alice");
}

#[tokio::test]
async fn repeated_like_is_a_silent_no_op() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    {
        let conn = state.db.lock().unwrap();
        store::users::insert(&conn, "alice", "Alice").unwrap();
        store::users::insert(&conn, "bob", "Bob").unwrap();
    }

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    let mut bob = TestClient::connect(addr, &state, "bob").await;

    let like_bob = json!({
        "event": "create-user-match",
        "data": {"userMatchId": "bob"}
    });
    alice.send(like_bob.clone()).await;
    bob.expect_event("match-created").await;

    // Double-tap: no error on the liker, no second nudge on the liked
    alice.send(like_bob.clone()).await;
    alice.expect_silence(Duration::from_millis(200)).await;
    bob.expect_silence(Duration::from_millis(200)).await;

    // Reciprocation still promotes normally
    bob.send(json!({
        "event": "create-user-match",
        "data": {"userMatchId": "alice"}
    }))
    .await;
    alice.expect_event("user-matched").await;
    bob.expect_event("user-matched").await;

    // Re-liking after the match formed is equally inert
    alice.send(like_bob).await;
    alice.expect_silence(Duration::from_millis(200)).await;
    bob.expect_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn leaving_conversation_refreshes_list_and_stops_room_delivery() {
    let (addr, state, _tmp) = start_test_server(Duration::from_millis(100)).await;
    let (conversation_id, participant_a, _) = seed_private_conversation(&state, "alice", "bob");

    let mut alice = TestClient::connect(addr, &state, "alice").await;
    let mut bob = TestClient::connect(addr, &state, "bob").await;
    alice.join_rooms().await;
    bob.join_rooms().await;

    bob.send(json!({
        "event": "request-delete-conversation",
        "data": {"conversationId": conversation_id}
    }))
    .await;
    let data = bob.expect_event("send-delete-conversation").await;
    assert!(data["conversations"].as_array().unwrap().is_empty());

    // Bob left the room: the room broadcast no longer reaches him
    alice
        .send(json!({
            "event": "request-send-message",
            "data": {
                "conversationId": conversation_id,
                "senderParticipantId": participant_a,
                "content": "anyone there?"
            }
        }))
        .await;
    alice.expect_event("send-message").await;
    bob.expect_silence(Duration::from_millis(200)).await;
}
