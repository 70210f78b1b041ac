use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::models::Participant;
use crate::error::GatewayError;

fn map_row(row: &Row) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        user_id: row.get(2)?,
        time_joined: row.get(3)?,
        time_left: row.get(4)?,
    })
}

const COLS: &str = "id, conversation_id, user_id, time_joined, time_left";

/// Active participants of a conversation (time_left unset).
pub fn get_by_conversation_id(
    conn: &Connection,
    conversation_id: &str,
) -> Result<Vec<Participant>, GatewayError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLS} FROM participants
         WHERE conversation_id = ?1 AND time_left IS NULL
         ORDER BY time_joined"
    ))?;
    let rows = stmt
        .query_map(params![conversation_id], map_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// The most recent membership row of a user in a conversation, active or not.
pub fn get_for_user(
    conn: &Connection,
    conversation_id: &str,
    user_id: &str,
) -> Result<Option<Participant>, GatewayError> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {COLS} FROM participants
                 WHERE conversation_id = ?1 AND user_id = ?2
                 ORDER BY time_joined DESC LIMIT 1"
            ),
            params![conversation_id, user_id],
            map_row,
        )
        .optional()?;
    Ok(found)
}

/// Soft-leave: set time_left on the user's active membership. History stays
/// attributable through the row. No-op if the user has no active membership.
pub fn mark_left(
    conn: &Connection,
    conversation_id: &str,
    user_id: &str,
) -> Result<(), GatewayError> {
    conn.execute(
        "UPDATE participants SET time_left = ?1
         WHERE conversation_id = ?2 AND user_id = ?3 AND time_left IS NULL",
        params![super::now(), conversation_id, user_id],
    )?;
    Ok(())
}

/// Add a user to a conversation.
pub fn create(
    conn: &Connection,
    conversation_id: &str,
    user_id: &str,
) -> Result<Participant, GatewayError> {
    let participant = Participant {
        id: Uuid::now_v7().to_string(),
        conversation_id: conversation_id.to_string(),
        user_id: user_id.to_string(),
        time_joined: super::now(),
        time_left: None,
    };
    conn.execute(
        "INSERT INTO participants (id, conversation_id, user_id, time_joined, time_left)
         VALUES (?1, ?2, ?3, ?4, NULL)",
        params![
            participant.id,
            participant.conversation_id,
            participant.user_id,
            participant.time_joined
        ],
    )?;
    Ok(participant)
}
