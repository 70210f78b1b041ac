//! Row types for all tables, 1:1 with the schema in migrations.rs.
//! These double as wire models: they serialize in camelCase, matching the
//! payload shapes the client protocol expects.

use serde::{Deserialize, Serialize};

/// Minimal user identity as the gateway sees it. Profile data lives in the
/// user service; the gateway only needs id + display label for call and
/// match payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Private,
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "group" => Self::Group,
            _ => Self::Private,
        }
    }
}

/// A conversation with its denormalized last-message snapshot hydrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    pub time_started: String,
    pub time_closed: Option<String>,
    pub last_message: Option<Message>,
}

/// One user's membership in one conversation. Leaving sets time_left
/// (soft-leave) so history stays attributable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub time_joined: String,
    pub time_left: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_participant_id: String,
    pub content: String,
    pub reply_to: Option<String>,
    pub attachments: Vec<String>,
    pub is_edited: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Matched,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Matched => "matched",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "matched" => Self::Matched,
            _ => Self::Pending,
        }
    }
}

/// Directed interest row: `user_id` liked `user_match_id`. Promoted to
/// `matched` when the reciprocal row arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMatch {
    pub id: String,
    pub user_id: String,
    pub user_match_id: String,
    pub status: MatchStatus,
    pub created_at: String,
    pub updated_at: String,
}
