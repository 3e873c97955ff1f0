//! SQLite persistence. Raw SQL with rusqlite, no ORM.

pub mod meetings;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

pub fn open(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(db_path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meetings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            meet_link TEXT NOT NULL,
            user_email TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'in_flight',
            start_time TEXT NOT NULL,
            end_time TEXT,
            summary_path TEXT,
            transcript_path TEXT,
            error TEXT
        )",
        [],
    )
    .context("Failed to create meetings table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_start_time ON meetings(start_time DESC)",
        [],
    )
    .context("Failed to create index on start_time")?;

    Ok(())
}
