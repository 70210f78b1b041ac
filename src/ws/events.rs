//! Wire protocol: every frame is a JSON envelope `{"event": ..., "data": ...}`.
//! Event names and payload shapes mirror the client contract; ids travel as
//! strings, fields in camelCase.

use serde::{Deserialize, Serialize};

use crate::call::state::CallKind;
use crate::db::models::{Conversation, Message, Participant, UserRef};

// --- Inbound (client → server) ---

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "request-all-conversations")]
    RequestAllConversations,
    #[serde(rename = "request-delete-conversation")]
    RequestDeleteConversation(DeleteConversationPayload),
    #[serde(rename = "request-all-messages")]
    RequestAllMessages(GetMessagesPayload),
    #[serde(rename = "request-typing")]
    RequestTyping(TypingPayload),
    #[serde(rename = "request-stop-typing")]
    RequestStopTyping(TypingPayload),
    #[serde(rename = "request-send-message")]
    RequestSendMessage(SendMessagePayload),
    #[serde(rename = "request-update-message")]
    RequestUpdateMessage(UpdateMessagePayload),
    #[serde(rename = "request-delete-message")]
    RequestDeleteMessage(DeleteMessagePayload),
    #[serde(rename = "call-init")]
    CallInit(CallInitPayload),
    #[serde(rename = "call-accepted")]
    CallAccepted(CallAcceptedPayload),
    #[serde(rename = "call-rejected")]
    CallRejected(CallRejectedPayload),
    #[serde(rename = "call-hangup")]
    CallHangup(CallHangupPayload),
    #[serde(rename = "toggle-mic")]
    ToggleMic(ToggleMicPayload),
    #[serde(rename = "create-user-match")]
    CreateUserMatch(CreateUserMatchPayload),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConversationPayload {
    pub conversation_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMessagesPayload {
    pub conversation_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub conversation_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub conversation_id: String,
    pub sender_participant_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessagePayload {
    pub message_id: String,
    pub conversation_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessagePayload {
    pub message_id: String,
    pub receiver_id: String,
    pub conversation_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInitPayload {
    pub receiver_id: String,
    pub conversation_id: String,
    pub call_kind: CallKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAcceptedPayload {
    /// User id of the calling side.
    pub caller: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRejectedPayload {
    pub caller: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallHangupPayload {
    pub caller: String,
    pub receiver: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleMicPayload {
    pub conversation_id: String,
    pub user_id_disable_mic: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserMatchPayload {
    pub user_match_id: String,
}

// --- Outbound (server → client) ---

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "send-all-conversations", rename_all = "camelCase")]
    SendAllConversations { conversations: Vec<Conversation> },
    #[serde(rename = "send-delete-conversation", rename_all = "camelCase")]
    SendDeleteConversation { conversations: Vec<Conversation> },
    #[serde(rename = "send-all-messages", rename_all = "camelCase")]
    SendAllMessages {
        conversation: Conversation,
        messages: Vec<Message>,
        sender_participant: Option<Participant>,
        receiver_participant: Option<Participant>,
    },
    #[serde(rename = "send-typing", rename_all = "camelCase")]
    SendTyping { conversation_id: String },
    #[serde(rename = "send-stop-typing", rename_all = "camelCase")]
    SendStopTyping { conversation_id: String },
    #[serde(rename = "send-message", rename_all = "camelCase")]
    SendMessage {
        message: Message,
        conversation_updated: Conversation,
    },
    #[serde(rename = "send-update-message", rename_all = "camelCase")]
    SendUpdateMessage {
        message: Message,
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_updated: Option<Conversation>,
    },
    #[serde(rename = "send-delete-message", rename_all = "camelCase")]
    SendDeleteMessage {
        messages: Vec<Message>,
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_updated: Option<Conversation>,
    },
    #[serde(rename = "call-incoming", rename_all = "camelCase")]
    CallIncoming {
        conversation_id: String,
        receiver_id: String,
        caller: UserRef,
        call_kind: CallKind,
    },
    #[serde(rename = "user-unavailable")]
    UserUnavailable,
    #[serde(rename = "call-accepted", rename_all = "camelCase")]
    CallAccepted { acceptor: UserRef, caller: UserRef },
    #[serde(rename = "call-rejected", rename_all = "camelCase")]
    CallRejected { receiver: UserRef },
    #[serde(rename = "call-hangup")]
    CallHangup,
    #[serde(rename = "mic-toggled", rename_all = "camelCase")]
    MicToggled { user_id_disable_mic: String },
    #[serde(rename = "user-matched", rename_all = "camelCase")]
    UserMatched { user_matched: UserRef },
    #[serde(rename = "match-created")]
    MatchCreated,
    #[serde(rename = "error", rename_all = "camelCase")]
    Error { code: u32, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_envelope_decodes() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"request-send-message","data":{"conversationId":"c1","senderParticipantId":"p1","content":"hi"}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::RequestSendMessage(payload) => {
                assert_eq!(payload.conversation_id, "c1");
                assert_eq!(payload.content.as_deref(), Some("hi"));
                assert!(payload.attachments.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unit_event_decodes_without_data() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"request-all-conversations"}"#).unwrap();
        assert!(matches!(event, ClientEvent::RequestAllConversations));
    }

    #[test]
    fn server_envelope_shape() {
        let json = serde_json::to_value(ServerEvent::SendTyping {
            conversation_id: "c1".to_string(),
        })
        .unwrap();
        assert_eq!(json["event"], "send-typing");
        assert_eq!(json["data"]["conversationId"], "c1");

        let json = serde_json::to_value(ServerEvent::UserUnavailable).unwrap();
        assert_eq!(json["event"], "user-unavailable");
    }
}
