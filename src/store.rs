//! ALFA Face Vault - Database
//!
//! One SQLite connection shared by the identity store and the key vault.
//! The connection sits behind a mutex, so every statement sequence executed
//! under one guard is serialized against all other writers.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

use crate::error::{VaultError, VaultResult};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS identities (
        username TEXT PRIMARY KEY,
        descriptor BLOB,
        role TEXT NOT NULL DEFAULT 'user',
        failed_attempts INTEGER NOT NULL DEFAULT 0,
        lockout_until TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS file_keys (
        username TEXT NOT NULL,
        file_path TEXT NOT NULL,
        key BLOB NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (username, file_path),
        FOREIGN KEY (username) REFERENCES identities(username) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_file_keys_user ON file_keys(username);
"#;

/// Shared database handle
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file
    pub fn open<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> VaultResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> VaultResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Exclusive access to the connection
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

pub(crate) fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339()
}

pub(crate) fn decode_time(raw: &str) -> VaultResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| VaultError::Storage(format!("invalid timestamp {raw:?}: {e}")))
}
