pub mod migrations;
pub mod models;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

/// The shared database handle. rusqlite is synchronous, so the single
/// connection lives behind a mutex and every query runs inside
/// tokio::task::spawn_blocking.
pub type DbPool = Arc<Mutex<Connection>>;

/// Open (or create) the database under `data_dir` and bring the schema to
/// the latest migration. WAL keeps readers off the writer's back.
pub fn init_db(data_dir: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = Path::new(data_dir).join("amora.db");

    let conn = Connection::open(&db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    let pool = prepare(conn)?;

    tracing::info!("Database initialized at {}", db_path.display());
    Ok(pool)
}

/// In-memory database with the full schema applied. Test helper.
pub fn init_db_in_memory() -> Result<DbPool, Box<dyn std::error::Error>> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(mut conn: Connection) -> Result<DbPool, Box<dyn std::error::Error>> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migrations::migrations().to_latest(&mut conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}
