use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::models::Message;
use crate::error::GatewayError;

pub struct NewMessage {
    pub conversation_id: String,
    pub sender_participant_id: String,
    pub content: String,
    pub reply_to: Option<String>,
    pub attachments: Vec<String>,
}

const COLS: &str = "id, conversation_id, sender_participant_id, content, reply_to, \
                    attachments, is_edited, created_at";

fn map_row(row: &Row) -> rusqlite::Result<Message> {
    let attachments_json: String = row.get(5)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_participant_id: row.get(2)?,
        content: row.get(3)?,
        reply_to: row.get(4)?,
        attachments: serde_json::from_str(&attachments_json).unwrap_or_default(),
        is_edited: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Fetch a message by id. Deleted messages are invisible here.
pub fn get(conn: &Connection, message_id: &str) -> Result<Option<Message>, GatewayError> {
    let found = conn
        .query_row(
            &format!("SELECT {COLS} FROM messages WHERE id = ?1 AND deleted = 0"),
            params![message_id],
            map_row,
        )
        .optional()?;
    Ok(found)
}

/// Persist a new message. `reply_to`, if set, must reference a non-deleted
/// message of the same conversation.
pub fn create(conn: &Connection, new: NewMessage) -> Result<Message, GatewayError> {
    if let Some(reply_to) = &new.reply_to {
        let target_conversation: Option<String> = conn
            .query_row(
                "SELECT conversation_id FROM messages WHERE id = ?1 AND deleted = 0",
                params![reply_to],
                |row| row.get(0),
            )
            .optional()?;
        match target_conversation {
            Some(cid) if cid == new.conversation_id => {}
            Some(_) => {
                return Err(GatewayError::Validation(
                    "replyTo must reference a message in the same conversation".to_string(),
                ))
            }
            None => {
                return Err(GatewayError::NotFound(
                    "replyTo message not found".to_string(),
                ))
            }
        }
    }

    let message = Message {
        id: Uuid::now_v7().to_string(),
        conversation_id: new.conversation_id,
        sender_participant_id: new.sender_participant_id,
        content: new.content,
        reply_to: new.reply_to,
        attachments: new.attachments,
        is_edited: false,
        created_at: super::now(),
    };

    let attachments_json =
        serde_json::to_string(&message.attachments).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO messages
             (id, conversation_id, sender_participant_id, content, reply_to,
              attachments, is_edited, deleted, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7)",
        params![
            message.id,
            message.conversation_id,
            message.sender_participant_id,
            message.content,
            message.reply_to,
            attachments_json,
            message.created_at
        ],
    )?;
    Ok(message)
}

/// Replace a message's content and mark it edited.
pub fn update(conn: &Connection, message_id: &str, content: &str) -> Result<Message, GatewayError> {
    let changed = conn.execute(
        "UPDATE messages SET content = ?1, is_edited = 1 WHERE id = ?2 AND deleted = 0",
        params![content, message_id],
    )?;
    if changed == 0 {
        return Err(GatewayError::NotFound("message not found".to_string()));
    }
    get(conn, message_id)?.ok_or_else(|| GatewayError::NotFound("message not found".to_string()))
}

/// Soft-delete a message. The row stays so reply chains and history
/// attribution survive.
pub fn soft_delete(conn: &Connection, message_id: &str) -> Result<(), GatewayError> {
    let changed = conn.execute(
        "UPDATE messages SET deleted = 1 WHERE id = ?1 AND deleted = 0",
        params![message_id],
    )?;
    if changed == 0 {
        return Err(GatewayError::NotFound("message not found".to_string()));
    }
    Ok(())
}

/// The conversation's messages as visible to one user, newest first.
/// A soft-left participant sees only messages created up to their time_left.
pub fn list_by_conversation_and_user(
    conn: &Connection,
    conversation_id: &str,
    user_id: &str,
) -> Result<Vec<Message>, GatewayError> {
    let cutoff = super::participants::get_for_user(conn, conversation_id, user_id)?
        .and_then(|p| p.time_left);

    let mut stmt = conn.prepare(&format!(
        "SELECT {COLS} FROM messages
         WHERE conversation_id = ?1 AND deleted = 0
           AND (?2 IS NULL OR created_at <= ?2)
         ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt
        .query_map(params![conversation_id, cutoff], map_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
