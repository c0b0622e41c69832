mod executions;
mod projects;
mod schedules;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::Type;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// SQLite-backed persistence for projects, executions and schedules.
///
/// The connection is shared behind an async mutex; every method locks it for
/// the duration of a single statement, so writes are effectively single-row
/// upserts with no cross-entity transactions.
pub struct Storage {
    db: Arc<Mutex<Connection>>,
}

impl Storage {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db = Connection::open(db_path.as_ref())?;
        create_schema(&db)?;
        info!("Database ready at {:?}", db_path.as_ref());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    async fn lock(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.db.lock().await
    }
}

fn create_schema(db: &Connection) -> Result<()> {
    db.execute(
        "CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            ai_cli_command TEXT NOT NULL DEFAULT '',
            directory_path TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS executions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL,
            command TEXT NOT NULL,
            status TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            summary TEXT NOT NULL DEFAULT '',
            details TEXT NOT NULL DEFAULT '',
            modified_files TEXT NOT NULL DEFAULT '[]',
            created_files TEXT NOT NULL DEFAULT '[]',
            deleted_files TEXT NOT NULL DEFAULT '[]',
            error_message TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL,
            command TEXT NOT NULL,
            scheduled_time TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    Ok(())
}

// --- Row conversion helpers shared by the per-entity impl files ---

fn timestamp_from_sql(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn file_list_from_sql(idx: usize, value: String) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn invalid_status(idx: usize, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown status '{}'", value).into(),
    )
}

#[cfg(test)]
pub(crate) async fn test_storage() -> Storage {
    let db = Connection::open_in_memory().expect("open in-memory db");
    create_schema(&db).expect("create schema");
    Storage {
        db: Arc::new(Mutex::new(db)),
    }
}
