use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

pub fn init_db() -> Result<Connection> {
    let db_path = crate::global::db_file()?;
    open_at(&db_path)
}

/// Open (or create) the database at `path` and apply migrations.
pub fn open_at(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS invocations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            invocation_id TEXT NOT NULL,
            function TEXT NOT NULL,
            trigger_event TEXT NOT NULL,
            attempt INTEGER NOT NULL DEFAULT 1,
            outcome TEXT NOT NULL,
            error TEXT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create invocations table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_invocations_started_at ON invocations(started_at DESC)",
        [],
    )
    .context("Failed to create invocations started_at index")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_invocations_outcome ON invocations(outcome)",
        [],
    )
    .context("Failed to create invocations outcome index")?;

    Ok(())
}
