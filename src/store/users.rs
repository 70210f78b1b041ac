use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::UserRef;
use crate::error::GatewayError;

/// Look up a user's identity label. Absent users resolve to their id with an
/// "Unknown" label rather than failing — delivery paths must not error on
/// identities the gateway has never seen.
pub fn get(conn: &Connection, user_id: &str) -> Result<UserRef, GatewayError> {
    let found = conn
        .query_row(
            "SELECT id, display_name FROM users WHERE id = ?1",
            params![user_id],
            |row| {
                Ok(UserRef {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                })
            },
        )
        .optional()?;

    Ok(found.unwrap_or_else(|| UserRef {
        id: user_id.to_string(),
        display_name: "Unknown".to_string(),
    }))
}

/// Insert a user row. Used by seeding and tests; user provisioning itself is
/// owned by the identity service.
pub fn insert(conn: &Connection, id: &str, display_name: &str) -> Result<UserRef, GatewayError> {
    conn.execute(
        "INSERT INTO users (id, display_name, created_at) VALUES (?1, ?2, ?3)",
        params![id, display_name, super::now()],
    )?;
    Ok(UserRef {
        id: id.to_string(),
        display_name: display_name.to_string(),
    })
}
