//! ALFA Face Vault - Identity Store
//!
//! Enrolled users, their reference descriptor and lockout state.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::error::{VaultError, VaultResult};
use crate::keyvault::KeyVault;
use crate::lockout::LockoutPolicy;
use crate::store::{decode_time, encode_time, Database};

/// Account role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(VaultError::Storage(format!("unknown role {other:?}"))),
        }
    }
}

/// Stored identity
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub username: String,
    /// Absent for accounts created by an admin without enrollment
    pub descriptor: Option<Descriptor>,
    pub role: Role,
    pub failed_attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(
        username: &str,
        descriptor: Option<Descriptor>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            username: username.to_string(),
            descriptor,
            role,
            failed_attempts: 0,
            lockout_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_enrolled(&self) -> bool {
        self.descriptor.is_some()
    }

    fn from_row(row: &Row<'_>) -> VaultResult<Self> {
        let username: String = row.get(0)?;
        let descriptor: Option<Vec<u8>> = row.get(1)?;
        let role: String = row.get(2)?;
        let failed_attempts: i64 = row.get(3)?;
        let lockout_until: Option<String> = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        Ok(Self {
            username,
            descriptor: descriptor.as_deref().map(Descriptor::from_bytes).transpose()?,
            role: role.parse()?,
            failed_attempts: u32::try_from(failed_attempts).map_err(|_| {
                VaultError::Storage(format!("invalid failed_attempts {failed_attempts}"))
            })?,
            lockout_until: lockout_until.as_deref().map(decode_time).transpose()?,
            created_at: decode_time(&created_at)?,
            updated_at: decode_time(&updated_at)?,
        })
    }
}

const SELECT_IDENTITY: &str = "SELECT username, descriptor, role, failed_attempts, lockout_until, created_at, updated_at FROM identities";

/// Identity store backed by the shared database
pub struct IdentityStore {
    db: Arc<Database>,
    policy: LockoutPolicy,
    descriptor_len: usize,
}

impl IdentityStore {
    pub fn new(db: Arc<Database>, policy: LockoutPolicy, descriptor_len: usize) -> Self {
        Self {
            db,
            policy,
            descriptor_len,
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Create a new identity
    pub fn create(
        &self,
        username: &str,
        descriptor: Option<&Descriptor>,
        role: Role,
        now: DateTime<Utc>,
    ) -> VaultResult<Identity> {
        if let Some(d) = descriptor {
            self.check_len(d)?;
        }

        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        if fetch(&tx, username)?.is_some() {
            return Err(VaultError::AlreadyExists(username.to_string()));
        }

        let identity = Identity::new(username, descriptor.cloned(), role, now);
        tx.execute(
            "INSERT INTO identities (username, descriptor, role, failed_attempts, lockout_until, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, NULL, ?4, ?4)",
            params![
                identity.username,
                identity.descriptor.as_ref().map(Descriptor::to_bytes),
                identity.role.as_str(),
                encode_time(now),
            ],
        )?;
        tx.commit()?;

        Ok(identity)
    }

    /// Get identity by username
    pub fn get(&self, username: &str) -> VaultResult<Identity> {
        let conn = self.db.lock();
        fetch(&conn, username)?.ok_or_else(|| VaultError::NotFound(username.to_string()))
    }

    /// All identities ordered by username
    pub fn list(&self) -> VaultResult<Vec<Identity>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!("{SELECT_IDENTITY} ORDER BY username"))?;
        let mut rows = stmt.query([])?;

        let mut identities = Vec::new();
        while let Some(row) = rows.next()? {
            identities.push(Identity::from_row(row)?);
        }
        Ok(identities)
    }

    /// Replace the descriptor; resets the counter and clears any lock
    pub fn update_descriptor(
        &self,
        username: &str,
        descriptor: &Descriptor,
        now: DateTime<Utc>,
    ) -> VaultResult<Identity> {
        self.check_len(descriptor)?;

        self.mutate(username, |identity| {
            identity.descriptor = Some(descriptor.clone());
            identity.failed_attempts = 0;
            identity.lockout_until = None;
            identity.updated_at = now;
            true
        })
    }

    /// Charge one failed match against the identity.
    ///
    /// Still-locked identities are returned unchanged.
    pub fn record_failure(&self, username: &str, now: DateTime<Utc>) -> VaultResult<Identity> {
        let policy = self.policy;
        self.mutate(username, |identity| match policy.on_failure(identity, now) {
            Some(update) => {
                identity.failed_attempts = update.failed_attempts;
                identity.lockout_until = update.lockout_until;
                identity.updated_at = now;
                true
            }
            None => false,
        })
    }

    /// Reset the counter and clear the lock after a successful match
    pub fn record_success(&self, username: &str, now: DateTime<Utc>) -> VaultResult<Identity> {
        self.mutate(username, |identity| {
            let changed = identity.failed_attempts != 0 || identity.lockout_until.is_some();
            identity.failed_attempts = 0;
            identity.lockout_until = None;
            if changed {
                identity.updated_at = now;
            }
            changed
        })
    }

    /// Explicit admin unlock
    pub fn unlock(&self, username: &str, now: DateTime<Utc>) -> VaultResult<Identity> {
        self.record_success(username, now)
    }

    /// Delete the identity together with every key it owns.
    ///
    /// Returns the number of purged keys.
    pub fn remove(&self, username: &str) -> VaultResult<usize> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        if fetch(&tx, username)?.is_none() {
            return Err(VaultError::NotFound(username.to_string()));
        }

        let purged = KeyVault::purge_in(&tx, username)?;
        tx.execute("DELETE FROM identities WHERE username = ?1", params![username])?;
        tx.commit()?;

        Ok(purged)
    }

    /// Read-modify-write inside one transaction.
    ///
    /// `apply` returns whether anything changed; unchanged rows are not written.
    fn mutate<F>(&self, username: &str, apply: F) -> VaultResult<Identity>
    where
        F: FnOnce(&mut Identity) -> bool,
    {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        let mut identity =
            fetch(&tx, username)?.ok_or_else(|| VaultError::NotFound(username.to_string()))?;

        if apply(&mut identity) {
            tx.execute(
                "UPDATE identities
                 SET descriptor = ?2, failed_attempts = ?3, lockout_until = ?4, updated_at = ?5
                 WHERE username = ?1",
                params![
                    identity.username,
                    identity.descriptor.as_ref().map(Descriptor::to_bytes),
                    identity.failed_attempts,
                    identity.lockout_until.map(encode_time),
                    encode_time(identity.updated_at),
                ],
            )?;
            tx.commit()?;
        }

        Ok(identity)
    }

    fn check_len(&self, descriptor: &Descriptor) -> VaultResult<()> {
        if descriptor.len() != self.descriptor_len {
            return Err(VaultError::DimensionMismatch {
                expected: self.descriptor_len,
                actual: descriptor.len(),
            });
        }
        Ok(())
    }
}

fn fetch(conn: &Connection, username: &str) -> VaultResult<Option<Identity>> {
    let mut stmt = conn.prepare(&format!("{SELECT_IDENTITY} WHERE username = ?1"))?;
    let mut rows = stmt.query(params![username])?;
    let identity = match rows.next()? {
        Some(row) => Some(Identity::from_row(row)?),
        None => None,
    };
    Ok(identity)
}
