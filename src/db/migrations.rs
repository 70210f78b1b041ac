use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: conversations, participants, messages, matches

CREATE TABLE users (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE conversations (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL DEFAULT 'private',
    time_started TEXT NOT NULL,
    time_closed TEXT,
    last_message_id TEXT REFERENCES messages(id)
);

CREATE TABLE participants (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id),
    user_id TEXT NOT NULL REFERENCES users(id),
    time_joined TEXT NOT NULL,
    time_left TEXT
);

-- At most one active membership per (user, conversation)
CREATE UNIQUE INDEX idx_participants_active
    ON participants(conversation_id, user_id) WHERE time_left IS NULL;
CREATE INDEX idx_participants_user ON participants(user_id);

CREATE TABLE messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id),
    sender_participant_id TEXT NOT NULL REFERENCES participants(id),
    content TEXT NOT NULL DEFAULT '',
    reply_to TEXT REFERENCES messages(id),
    attachments TEXT NOT NULL DEFAULT '[]',
    is_edited INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_messages_conversation ON messages(conversation_id, created_at);

CREATE TABLE user_matches (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    user_match_id TEXT NOT NULL REFERENCES users(id),
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- One directed row per (liker, liked) pair
CREATE UNIQUE INDEX idx_user_matches_pair ON user_matches(user_id, user_match_id);
",
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_validate() {
        assert!(migrations().validate().is_ok());
    }
}
