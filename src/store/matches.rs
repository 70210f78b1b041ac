use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::models::{MatchStatus, UserMatch};
use crate::error::GatewayError;

const COLS: &str = "id, user_id, user_match_id, status, created_at, updated_at";

fn map_row(row: &Row) -> rusqlite::Result<UserMatch> {
    let status: String = row.get(3)?;
    Ok(UserMatch {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_match_id: row.get(2)?,
        status: MatchStatus::from_str(&status),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// The pending interest row where `user_id` previously liked `user_match_id`.
/// Checked with swapped roles to detect reciprocation.
pub fn find_existing(
    conn: &Connection,
    user_id: &str,
    user_match_id: &str,
) -> Result<Option<UserMatch>, GatewayError> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {COLS} FROM user_matches
                 WHERE user_id = ?1 AND user_match_id = ?2 AND status = 'pending'"
            ),
            params![user_id, user_match_id],
            map_row,
        )
        .optional()?;
    Ok(found)
}

/// Whether any interest row links the pair, in either direction and any
/// status. A repeated like must be a no-op, not a constraint violation.
pub fn exists_between(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> Result<bool, GatewayError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM user_matches
             WHERE (user_id = ?1 AND user_match_id = ?2)
                OR (user_id = ?2 AND user_match_id = ?1)",
            params![user_a, user_b],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Record a one-sided interest.
pub fn create_pending(
    conn: &Connection,
    user_id: &str,
    user_match_id: &str,
) -> Result<UserMatch, GatewayError> {
    let now = super::now();
    let row = UserMatch {
        id: Uuid::now_v7().to_string(),
        user_id: user_id.to_string(),
        user_match_id: user_match_id.to_string(),
        status: MatchStatus::Pending,
        created_at: now.clone(),
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO user_matches (id, user_id, user_match_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'pending', ?4, ?5)",
        params![
            row.id,
            row.user_id,
            row.user_match_id,
            row.created_at,
            row.updated_at
        ],
    )?;
    Ok(row)
}

/// Promote a pending row to matched on reciprocation.
pub fn promote(conn: &Connection, match_id: &str) -> Result<UserMatch, GatewayError> {
    let changed = conn.execute(
        "UPDATE user_matches SET status = 'matched', updated_at = ?1
         WHERE id = ?2 AND status = 'pending'",
        params![super::now(), match_id],
    )?;
    if changed == 0 {
        return Err(GatewayError::NotFound("match not found".to_string()));
    }
    conn.query_row(
        &format!("SELECT {COLS} FROM user_matches WHERE id = ?1"),
        params![match_id],
        map_row,
    )
    .map_err(Into::into)
}
