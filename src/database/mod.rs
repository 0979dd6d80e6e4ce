pub mod repositories;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not find home directory")]
    NoHomeDirectory,

    #[error("Room group not found: {0}")]
    NotFound(String),
}

pub fn establish_connection(db_path: &Path) -> Result<Connection, DatabaseError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(db_path)?;
    initialize_schema(&conn)?;
    Ok(conn)
}

pub fn establish_in_memory() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// `~/Documents/Stagers/stagers.db`
pub fn get_database_path() -> Result<PathBuf, DatabaseError> {
    let home_dir = dirs::home_dir().ok_or(DatabaseError::NoHomeDirectory)?;
    Ok(home_dir.join("Documents").join("Stagers").join("stagers.db"))
}

fn initialize_schema(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS room_groups (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            room_type TEXT NOT NULL,
            similarity REAL NOT NULL,
            position INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_room_groups_project ON room_groups(project_id);

        CREATE TABLE IF NOT EXISTS room_group_images (
            group_id TEXT NOT NULL REFERENCES room_groups(id) ON DELETE CASCADE,
            image_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (group_id, image_id)
        );",
    )?;
    Ok(())
}
