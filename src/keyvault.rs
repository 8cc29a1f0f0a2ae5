//! ALFA Face Vault - Key Vault
//!
//! One key per (username, file path), minted on first protect and reused
//! for every later protect of the same pair. Keys are never rotated.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::crypto::FileKey;
use crate::error::{VaultError, VaultResult};
use crate::store::{encode_time, Database};

/// Key vault backed by the shared database
pub struct KeyVault {
    db: Arc<Database>,
}

impl KeyVault {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Return the stored key for the pair, creating it on first use
    pub fn get_or_create(
        &self,
        username: &str,
        file_path: &str,
        now: DateTime<Utc>,
    ) -> VaultResult<FileKey> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        if let Some(key) = select_key(&tx, username, file_path)? {
            return Ok(key);
        }

        let key = FileKey::generate();
        tx.execute(
            "INSERT INTO file_keys (username, file_path, key, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username, file_path, key.expose().as_slice(), encode_time(now)],
        )?;
        tx.commit()?;

        log::debug!(
            "created key {} for {} / {}",
            key.fingerprint(),
            username,
            file_path
        );
        Ok(key)
    }

    /// Return the stored key; never creates one
    pub fn lookup(&self, username: &str, file_path: &str) -> VaultResult<FileKey> {
        let conn = self.db.lock();
        select_key(&conn, username, file_path)?.ok_or_else(|| VaultError::KeyNotFound {
            username: username.to_string(),
            path: file_path.to_string(),
        })
    }

    /// Delete every key owned by `username`
    pub fn purge(&self, username: &str) -> VaultResult<usize> {
        let conn = self.db.lock();
        Self::purge_in(&conn, username)
    }

    /// Purge on a connection the caller already holds (e.g. inside a transaction)
    pub(crate) fn purge_in(conn: &Connection, username: &str) -> VaultResult<usize> {
        let removed = conn.execute("DELETE FROM file_keys WHERE username = ?1", params![username])?;
        Ok(removed)
    }

    /// Paths protected for `username`
    pub fn list_paths(&self, username: &str) -> VaultResult<Vec<String>> {
        let conn = self.db.lock();
        let mut stmt =
            conn.prepare("SELECT file_path FROM file_keys WHERE username = ?1 ORDER BY file_path")?;
        let paths = stmt
            .query_map(params![username], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(paths)
    }
}

fn select_key(conn: &Connection, username: &str, file_path: &str) -> VaultResult<Option<FileKey>> {
    let blob: Option<Vec<u8>> = conn
        .query_row(
            "SELECT key FROM file_keys WHERE username = ?1 AND file_path = ?2",
            params![username, file_path],
            |row| row.get(0),
        )
        .optional()?;

    blob.as_deref().map(FileKey::from_slice).transpose()
}
