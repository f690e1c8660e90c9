//! SQLite persistence.
//!
//! A single connection behind a mutex, versioned migrations, and the meetings
//! repository. The transactional meeting insert in `meetings` is the only
//! point in the pipeline that needs atomicity from the store.

pub mod meetings;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::Connection;

pub use meetings::MeetingSummary;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Database manager owning the SQLite connection
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    /// Open (or create) the database at `db_path` and migrate it up to date
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        Self::init(conn, db_path.to_path_buf())
    }

    /// Open an in-memory database. Used by tests and throwaway local runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, db_path: PathBuf) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")
            .context("Failed to enable foreign keys")?;

        run_migrations(&conn).context("Failed to run database migrations")?;

        tracing::debug!(db = %db_path.display(), "Database initialized");

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Execute a function with exclusive access to the connection
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock database connection: {}", e))?;
        f(&mut conn)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Bring the schema up to the current version
fn run_migrations(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Initial schema: meetings + participants
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS meetings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            summary TEXT NOT NULL,
            short_summary TEXT NOT NULL,
            transcription TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            meeting_id INTEGER NOT NULL REFERENCES meetings(id) ON DELETE CASCADE
        );

        INSERT INTO schema_version (version) VALUES (1);
        "#,
    )
    .context("Migration v1 failed")?;

    tracing::info!(version = SCHEMA_VERSION, "Database schema migrated");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_schema() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("nested").join("meetings.db");

        let db = Database::open(&db_path).unwrap();
        assert!(db_path.exists());

        db.with_connection(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM meetings", [], |row| row.get(0))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("meetings.db");

        // Opening twice must not fail or duplicate the version row
        drop(Database::open(&db_path).unwrap());
        let db = Database::open(&db_path).unwrap();

        db.with_connection(|conn| {
            let version: i32 =
                conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                    row.get(0)
                })?;
            assert_eq!(version, SCHEMA_VERSION);
            Ok(())
        })
        .unwrap();
    }
}
