use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::models::{Conversation, ConversationKind};
use crate::error::GatewayError;

const COLS: &str = "id, kind, time_started, time_closed, last_message_id";

struct ConversationRow {
    id: String,
    kind: String,
    time_started: String,
    time_closed: Option<String>,
    last_message_id: Option<String>,
}

fn map_row(row: &Row) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        time_started: row.get(2)?,
        time_closed: row.get(3)?,
        last_message_id: row.get(4)?,
    })
}

/// Hydrate the last-message snapshot. A deleted or missing target resolves to
/// no snapshot, so the invariant "lastMessage references a live message of
/// this conversation" holds on every read path.
fn hydrate(conn: &Connection, row: ConversationRow) -> Result<Conversation, GatewayError> {
    let last_message = match &row.last_message_id {
        Some(message_id) => super::messages::get(conn, message_id)?
            .filter(|m| m.conversation_id == row.id),
        None => None,
    };
    Ok(Conversation {
        id: row.id,
        kind: ConversationKind::from_str(&row.kind),
        time_started: row.time_started,
        time_closed: row.time_closed,
        last_message,
    })
}

pub fn get_by_id(
    conn: &Connection,
    conversation_id: &str,
) -> Result<Option<Conversation>, GatewayError> {
    let row = conn
        .query_row(
            &format!("SELECT {COLS} FROM conversations WHERE id = ?1"),
            params![conversation_id],
            map_row,
        )
        .optional()?;
    match row {
        Some(row) => Ok(Some(hydrate(conn, row)?)),
        None => Ok(None),
    }
}

/// Conversations where the user holds an active membership. This is the list
/// the client UI shows.
pub fn get_by_user_id(conn: &Connection, user_id: &str) -> Result<Vec<Conversation>, GatewayError> {
    list_for_user(conn, user_id, false)
}

/// Every conversation the user was ever a member of, soft-left included.
/// Used to (re)join rooms on connect so historical members keep receiving
/// room broadcasts.
pub fn get_by_user_id_including_left(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<Conversation>, GatewayError> {
    list_for_user(conn, user_id, true)
}

fn list_for_user(
    conn: &Connection,
    user_id: &str,
    include_left: bool,
) -> Result<Vec<Conversation>, GatewayError> {
    let filter = if include_left {
        ""
    } else {
        "AND p.time_left IS NULL"
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT c.id, c.kind, c.time_started, c.time_closed, c.last_message_id
         FROM conversations c
         JOIN participants p ON p.conversation_id = c.id
         WHERE p.user_id = ?1 {filter}
         ORDER BY c.time_started DESC"
    ))?;
    let rows = stmt
        .query_map(params![user_id], map_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(|row| hydrate(conn, row)).collect()
}

/// Point the conversation's last-message snapshot at a message and return the
/// refreshed conversation.
pub fn update_last_message(
    conn: &Connection,
    conversation_id: &str,
    message_id: &str,
) -> Result<Conversation, GatewayError> {
    conn.execute(
        "UPDATE conversations SET last_message_id = ?1 WHERE id = ?2",
        params![message_id, conversation_id],
    )?;
    get_by_id(conn, conversation_id)?
        .ok_or_else(|| GatewayError::NotFound("conversation not found".to_string()))
}

/// Unset the last-message snapshot (no messages remain).
pub fn clear_last_message(
    conn: &Connection,
    conversation_id: &str,
) -> Result<Conversation, GatewayError> {
    conn.execute(
        "UPDATE conversations SET last_message_id = NULL WHERE id = ?1",
        params![conversation_id],
    )?;
    get_by_id(conn, conversation_id)?
        .ok_or_else(|| GatewayError::NotFound("conversation not found".to_string()))
}

/// The private conversation between two users, if one was ever created.
/// Membership is matched regardless of soft-leave (history survives leaving).
pub fn find_private_between(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> Result<Option<Conversation>, GatewayError> {
    let id: Option<String> = conn
        .query_row(
            "SELECT c.id FROM conversations c
             JOIN participants pa ON pa.conversation_id = c.id AND pa.user_id = ?1
             JOIN participants pb ON pb.conversation_id = c.id AND pb.user_id = ?2
             WHERE c.kind = 'private'
             LIMIT 1",
            params![user_a, user_b],
            |row| row.get(0),
        )
        .optional()?;
    match id {
        Some(id) => get_by_id(conn, &id),
        None => Ok(None),
    }
}

/// Create a private conversation between two users on first contact.
pub fn create_private(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> Result<Conversation, GatewayError> {
    let id = Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO conversations (id, kind, time_started, time_closed, last_message_id)
         VALUES (?1, 'private', ?2, NULL, NULL)",
        params![id, super::now()],
    )?;
    super::participants::create(conn, &id, user_a)?;
    super::participants::create(conn, &id, user_b)?;
    get_by_id(conn, &id)?
        .ok_or_else(|| GatewayError::NotFound("conversation not found".to_string()))
}

/// Set time_closed if no active participant remains.
pub fn close_if_empty(conn: &Connection, conversation_id: &str) -> Result<(), GatewayError> {
    conn.execute(
        "UPDATE conversations SET time_closed = ?1
         WHERE id = ?2 AND time_closed IS NULL
           AND NOT EXISTS (
               SELECT 1 FROM participants
               WHERE conversation_id = ?2 AND time_left IS NULL
           )",
        params![super::now(), conversation_id],
    )?;
    Ok(())
}
