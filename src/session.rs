//! ALFA Face Vault - Auth Session
//!
//! Composes identity lookup, lockout, descriptor matching and key custody
//! into the two user-facing flows: authenticate-and-protect and decrypt.
//! Also carries the admin surface (enrollment, removal, unlock).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use zeroize::Zeroize;

use crate::audit::{AuditAction, AuditEvent, AuditTrail};
use crate::config::VaultConfig;
use crate::crypto::FileCipher;
use crate::descriptor::{distance, normalize};
use crate::error::{VaultError, VaultResult};
use crate::feed::SnapshotReceiver;
use crate::identity::{Identity, IdentityStore, Role};
use crate::keyvault::KeyVault;
use crate::lockout::{Clock, LockState, LockoutPolicy, SystemClock};
use crate::secure_fs::SecureFs;
use crate::store::Database;

/// Successful protect operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtectResult {
    pub username: String,
    pub source_path: PathBuf,
    pub protected_path: PathBuf,
    /// Distance between candidate and enrolled descriptor
    pub distance: f64,
    pub bytes_written: usize,
    pub key_fingerprint: String,
}

/// Per-username mutexes; operations on one user run one at a time.
///
/// An entry lives only while some caller holds it, so the map never holds
/// more names than there are operations in flight.
#[derive(Default)]
struct UserLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    fn with<T>(&self, username: &str, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut map = self.inner.lock();
            Arc::clone(map.entry(username.to_string()).or_default())
        };

        let result = {
            let _guard = lock.lock();
            f()
        };

        // clones and releases both happen under the map lock: a count of 2
        // (map + ours) means no other caller holds this entry
        let mut map = self.inner.lock();
        if Arc::strong_count(&lock) == 2 {
            map.remove(username);
        }
        drop(lock);
        drop(map);
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Authentication and key-custody session
pub struct AuthSession {
    config: VaultConfig,
    policy: LockoutPolicy,
    identities: IdentityStore,
    keys: KeyVault,
    cipher: FileCipher,
    fs: SecureFs,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
    user_locks: UserLocks,
}

impl AuthSession {
    // ═══════════════════════════════════════════════════════════════════════
    // INITIALIZATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Open the database named in the config with the system clock
    pub fn open(config: VaultConfig) -> VaultResult<Self> {
        let db = Arc::new(Database::open(&config.database_path)?);
        Self::new(config, db, Arc::new(SystemClock))
    }

    /// Build a session on an existing database and clock
    pub fn new(config: VaultConfig, db: Arc<Database>, clock: Arc<dyn Clock>) -> VaultResult<Self> {
        config.validate()?;

        let policy = LockoutPolicy::from_config(&config);
        let audit = match &config.audit_log {
            Some(path) => AuditTrail::open(path)?,
            None => AuditTrail::disabled(),
        };

        Ok(Self {
            identities: IdentityStore::new(Arc::clone(&db), policy, config.descriptor_len),
            keys: KeyVault::new(db),
            cipher: FileCipher::new(),
            fs: SecureFs::new(&config.protected_suffix),
            policy,
            clock,
            audit,
            user_locks: UserLocks::default(),
            config,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    pub fn key_vault(&self) -> &KeyVault {
        &self.keys
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ADMIN
    // ═══════════════════════════════════════════════════════════════════════

    /// Enroll a new user with a raw descriptor
    pub fn register(&self, username: &str, descriptor: &[f64]) -> VaultResult<Identity> {
        let now = self.clock.now();
        let result = normalize(descriptor).and_then(|d| {
            self.user_locks.with(username, || {
                self.identities.create(username, Some(&d), Role::User, now)
            })
        });

        self.audit(username, AuditAction::Register, &result);
        if result.is_ok() {
            log::info!("User '{}' registered successfully", username);
        }
        result
    }

    /// Create an account without a descriptor
    pub fn create_account(&self, username: &str, role: Role) -> VaultResult<Identity> {
        let now = self.clock.now();
        let result = self
            .user_locks
            .with(username, || self.identities.create(username, None, role, now));

        self.audit_with(username, AuditAction::CreateAccount, &result, Some(role.as_str()));
        result
    }

    /// Re-enroll: overwrite the descriptor, reset the counter and clear the lock
    pub fn update_descriptor(&self, username: &str, descriptor: &[f64]) -> VaultResult<Identity> {
        let now = self.clock.now();
        let result = normalize(descriptor).and_then(|d| {
            self.user_locks.with(username, || {
                self.identities.update_descriptor(username, &d, now)
            })
        });

        self.audit(username, AuditAction::UpdateDescriptor, &result);
        result
    }

    /// Delete a user and every key it owns
    pub fn remove_user(&self, username: &str) -> VaultResult<usize> {
        let result = self.user_locks.with(username, || self.identities.remove(username));

        let detail = result.as_ref().ok().map(|n| format!("{n} key(s) purged"));
        self.audit_with(username, AuditAction::Remove, &result, detail.as_deref());
        result
    }

    /// Explicit unlock: clears the lock and the counter
    pub fn unlock_user(&self, username: &str) -> VaultResult<Identity> {
        let now = self.clock.now();
        let result = self
            .user_locks
            .with(username, || self.identities.unlock(username, now));

        self.audit(username, AuditAction::Unlock, &result);
        result
    }

    pub fn identity(&self, username: &str) -> VaultResult<Identity> {
        self.identities.get(username)
    }

    pub fn list_identities(&self) -> VaultResult<Vec<Identity>> {
        self.identities.list()
    }

    /// Lock state at the current instant
    pub fn lock_state(&self, username: &str) -> VaultResult<LockState> {
        let identity = self.identities.get(username)?;
        Ok(self.policy.state_of(&identity, self.clock.now()))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PROTECT / DECRYPT
    // ═══════════════════════════════════════════════════════════════════════

    /// Match `candidate` against the enrolled descriptor and, on success,
    /// encrypt `file_path` to `file_path + suffix`.
    pub fn authenticate_and_protect(
        &self,
        username: &str,
        candidate: Option<&[f64]>,
        file_path: &Path,
    ) -> VaultResult<ProtectResult> {
        let result = self.user_locks.with(username, || {
            self.authenticate_locked(username, candidate, file_path)
        });

        let detail = match &result {
            Ok(r) => format!(
                "{} -> {} (distance {:.4})",
                r.source_path.display(),
                r.protected_path.display(),
                r.distance
            ),
            Err(_) => file_path.display().to_string(),
        };
        self.audit_with(username, AuditAction::Authenticate, &result, Some(&detail));
        result
    }

    /// Same as [`AuthSession::authenticate_and_protect`] with the newest
    /// descriptor from the capture feed
    pub fn authenticate_latest(
        &self,
        username: &str,
        feed: &SnapshotReceiver,
        file_path: &Path,
    ) -> VaultResult<ProtectResult> {
        let candidate = feed.latest_descriptor();
        self.authenticate_and_protect(username, candidate.as_deref(), file_path)
    }

    fn authenticate_locked(
        &self,
        username: &str,
        candidate: Option<&[f64]>,
        file_path: &Path,
    ) -> VaultResult<ProtectResult> {
        let now = self.clock.now();
        let identity = self.identities.get(username)?;

        if let LockState::Locked { until } = self.policy.state_of(&identity, now) {
            return Err(VaultError::LockedOut { until });
        }

        let key_id = self.fs.path_id(file_path)?;
        let candidate = candidate.ok_or(VaultError::NoFaceDetected)?;
        let enrolled = identity
            .descriptor
            .as_ref()
            .ok_or_else(|| VaultError::NotEnrolled(username.to_string()))?;

        let d = distance(&normalize(candidate)?, enrolled)?;

        if d < self.config.match_threshold {
            self.identities.record_success(username, now)?;
            log::info!("User '{}' authenticated (distance {:.4})", username, d);
            return self.protect(username, file_path, key_id, d);
        }

        let updated = self.identities.record_failure(username, now)?;
        match self.policy.state_of(&updated, now) {
            LockState::Locked { until } => {
                log::warn!(
                    "User '{}' locked until {} after {} failed attempts",
                    username,
                    until,
                    updated.failed_attempts
                );
                if self.config.shred_on_lockout {
                    self.shred_target(file_path);
                }
                Err(VaultError::LockedOut { until })
            }
            LockState::Open => {
                let remaining = self.policy.remaining_attempts(&updated, now);
                log::warn!(
                    "Authentication failed for user '{}' (distance {:.4}, {} attempt(s) left)",
                    username,
                    d,
                    remaining
                );
                Err(VaultError::AuthenticationFailed { remaining })
            }
        }
    }

    fn protect(
        &self,
        username: &str,
        file_path: &Path,
        key_id: &str,
        distance: f64,
    ) -> VaultResult<ProtectResult> {
        let mut plaintext = self.fs.read_file(file_path)?;

        let sealed = self
            .keys
            .get_or_create(username, key_id, self.clock.now())
            .and_then(|key| Ok((self.cipher.encrypt(&plaintext, &key)?, key.fingerprint())));
        plaintext.zeroize();
        let (token, key_fingerprint) = sealed?;

        let protected_path = self.fs.protected_path(file_path);
        self.fs.write_file(&protected_path, &token)?;

        Ok(ProtectResult {
            username: username.to_string(),
            source_path: file_path.to_path_buf(),
            protected_path,
            distance,
            bytes_written: token.len(),
            key_fingerprint,
        })
    }

    fn shred_target(&self, file_path: &Path) {
        match self.fs.delete_file(file_path) {
            Ok(()) => log::warn!("Protected file {} shredded after lockout", file_path.display()),
            Err(e) => log::warn!("Failed to shred {}: {}", file_path.display(), e),
        }
    }

    /// Decrypt a protected file with the key stored for the user.
    ///
    /// No face match is required here; possession of the username and the
    /// exact original path is enough.
    pub fn decrypt_file(&self, username: &str, encrypted_path: &Path) -> VaultResult<Vec<u8>> {
        let result = self.decrypt_inner(username, encrypted_path);
        if let Err(e) = &result {
            if e.is_security_critical() {
                log::warn!(
                    "Decrypt of {} rejected for user '{}': {}",
                    encrypted_path.display(),
                    username,
                    e
                );
            }
        }
        self.audit_with(
            username,
            AuditAction::Decrypt,
            &result,
            Some(&encrypted_path.display().to_string()),
        );
        result
    }

    /// Decrypt and write the plaintext to `output`
    pub fn decrypt_to_file(
        &self,
        username: &str,
        encrypted_path: &Path,
        output: &Path,
    ) -> VaultResult<usize> {
        let mut plaintext = self.decrypt_file(username, encrypted_path)?;
        let written = self.fs.write_file(output, &plaintext).map(|()| plaintext.len());
        plaintext.zeroize();
        written
    }

    fn decrypt_inner(&self, username: &str, encrypted_path: &Path) -> VaultResult<Vec<u8>> {
        let encrypted_id = self.fs.path_id(encrypted_path)?;
        let original = self.fs.original_path(encrypted_path).ok_or_else(|| {
            VaultError::KeyNotFound {
                username: username.to_string(),
                path: encrypted_id.to_string(),
            }
        })?;

        let key = self.keys.lookup(username, self.fs.path_id(&original)?)?;
        let token = self.fs.read_file(encrypted_path)?;
        self.cipher.decrypt(&token, &key)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    fn audit<T>(&self, username: &str, action: AuditAction, result: &VaultResult<T>) {
        self.audit_with(username, action, result, None);
    }

    fn audit_with<T>(
        &self,
        username: &str,
        action: AuditAction,
        result: &VaultResult<T>,
        detail: Option<&str>,
    ) {
        let mut event = AuditEvent::new(self.clock.now(), username, action, result);
        if let Some(extra) = detail {
            event = match event.detail.take() {
                Some(error) => event.with_detail(format!("{error}: {extra}")),
                None => event.with_detail(extra),
            };
        }
        self.audit.record(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockout::ManualClock;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn session() -> (AuthSession, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let db = Arc::new(Database::open_in_memory().unwrap());
        let config = VaultConfig {
            descriptor_len: 3,
            ..Default::default()
        };
        let session = AuthSession::new(config, db, clock.clone()).unwrap();
        (session, clock)
    }

    #[test]
    fn test_no_face_does_not_count() {
        let (session, _clock) = session();
        let dir = tempdir().unwrap();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();

        let err = session
            .authenticate_and_protect("alice", None, &dir.path().join("f"))
            .unwrap_err();
        assert!(matches!(err, VaultError::NoFaceDetected));
        assert_eq!(session.identity("alice").unwrap().failed_attempts, 0);
    }

    #[test]
    fn test_unknown_user() {
        let (session, _clock) = session();
        let err = session
            .authenticate_and_protect("ghost", Some(&[1.0, 0.0, 0.0]), Path::new("f"))
            .unwrap_err();
        assert!(matches!(err, VaultError::NotFound(name) if name == "ghost"));
    }

    #[test]
    fn test_admin_account_not_enrolled() {
        let (session, _clock) = session();
        session.create_account("root", Role::Admin).unwrap();

        let err = session
            .authenticate_and_protect("root", Some(&[1.0, 0.0, 0.0]), Path::new("f"))
            .unwrap_err();
        assert!(matches!(err, VaultError::NotEnrolled(_)));

        session.update_descriptor("root", &[0.0, 1.0, 0.0]).unwrap();
        assert!(session.identity("root").unwrap().is_enrolled());
        assert_eq!(session.identity("root").unwrap().role, Role::Admin);
    }

    #[test]
    fn test_degenerate_and_mismatched_candidates() {
        let (session, _clock) = session();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();

        assert!(matches!(
            session.authenticate_and_protect("alice", Some(&[0.0, 0.0, 0.0]), Path::new("f")),
            Err(VaultError::DegenerateVector)
        ));
        assert!(matches!(
            session.authenticate_and_protect("alice", Some(&[1.0, 0.0]), Path::new("f")),
            Err(VaultError::DimensionMismatch { .. })
        ));
        assert_eq!(session.identity("alice").unwrap().failed_attempts, 0);
        assert!(matches!(
            session.register("bob", &[1.0, 0.0]),
            Err(VaultError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_match_without_file() {
        let (session, _clock) = session();
        let dir = tempdir().unwrap();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();

        let missing = dir.path().join("missing.txt");
        assert!(matches!(
            session.authenticate_and_protect("alice", Some(&[1.0, 0.0, 0.0]), &missing),
            Err(VaultError::FileNotFound(_))
        ));
        assert!(session.key_vault().list_paths("alice").unwrap().is_empty());
    }

    #[test]
    fn test_lockout_expires_lazily() {
        let (session, clock) = session();
        let dir = tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, b"hello").unwrap();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();

        let wrong = [0.0, 1.0, 0.0];
        for _ in 0..2 {
            assert!(matches!(
                session.authenticate_and_protect("alice", Some(&wrong), &file),
                Err(VaultError::AuthenticationFailed { .. })
            ));
        }
        assert!(matches!(
            session.authenticate_and_protect("alice", Some(&wrong), &file),
            Err(VaultError::LockedOut { .. })
        ));

        // even a correct face is rejected while locked
        assert!(matches!(
            session.authenticate_and_protect("alice", Some(&[1.0, 0.0, 0.0]), &file),
            Err(VaultError::LockedOut { .. })
        ));

        clock.advance(Duration::seconds(60));
        assert_eq!(session.lock_state("alice").unwrap(), LockState::Open);
        let result = session
            .authenticate_and_protect("alice", Some(&[1.0, 0.0, 0.0]), &file)
            .unwrap();
        assert!(result.protected_path.exists());
        assert_eq!(session.identity("alice").unwrap().failed_attempts, 0);
    }

    #[test]
    fn test_unlock_user() {
        let (session, _clock) = session();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();
        for _ in 0..3 {
            let _ = session.authenticate_and_protect("alice", Some(&[0.0, 0.0, 1.0]), Path::new("f"));
        }
        assert!(matches!(session.lock_state("alice").unwrap(), LockState::Locked { .. }));

        let unlocked = session.unlock_user("alice").unwrap();
        assert_eq!(unlocked.failed_attempts, 0);
        assert_eq!(session.lock_state("alice").unwrap(), LockState::Open);
    }

    #[test]
    fn test_shred_on_lockout() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let db = Arc::new(Database::open_in_memory().unwrap());
        let config = VaultConfig {
            descriptor_len: 3,
            max_attempts: 1,
            shred_on_lockout: true,
            ..Default::default()
        };
        let session = AuthSession::new(config, db, clock).unwrap();
        let dir = tempdir().unwrap();
        let file = dir.path().join("secret.txt");
        std::fs::write(&file, b"top secret").unwrap();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();

        assert!(matches!(
            session.authenticate_and_protect("alice", Some(&[0.0, 1.0, 0.0]), &file),
            Err(VaultError::LockedOut { .. })
        ));
        assert!(!file.exists());
    }

    #[test]
    fn test_decrypt_requires_exact_path_and_user() {
        let (session, _clock) = session();
        let dir = tempdir().unwrap();
        let file = dir.path().join("report.pdf");
        std::fs::write(&file, b"%PDF-1.7").unwrap();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();
        session.register("bob", &[0.0, 1.0, 0.0]).unwrap();

        let result = session
            .authenticate_and_protect("alice", Some(&[1.0, 0.0, 0.0]), &file)
            .unwrap();

        assert_eq!(session.decrypt_file("alice", &result.protected_path).unwrap(), b"%PDF-1.7");
        assert!(matches!(
            session.decrypt_file("bob", &result.protected_path),
            Err(VaultError::KeyNotFound { .. })
        ));
        assert!(matches!(
            session.decrypt_file("alice", &file),
            Err(VaultError::KeyNotFound { .. })
        ));

        let output = dir.path().join("out").join("report.pdf");
        assert_eq!(
            session.decrypt_to_file("alice", &result.protected_path, &output).unwrap(),
            8
        );
        assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn test_corrupted_token() {
        let (session, _clock) = session();
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"payload").unwrap();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();

        let result = session
            .authenticate_and_protect("alice", Some(&[1.0, 0.0, 0.0]), &file)
            .unwrap();
        let mut token = std::fs::read(&result.protected_path).unwrap();
        let last = token.len() - 1;
        token[last] ^= 0xFF;
        std::fs::write(&result.protected_path, &token).unwrap();

        assert!(matches!(
            session.decrypt_file("alice", &result.protected_path),
            Err(VaultError::AuthenticationFailure)
        ));

        std::fs::remove_file(&result.protected_path).unwrap();
        assert!(matches!(
            session.decrypt_file("alice", &result.protected_path),
            Err(VaultError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_remove_user_purges_keys() {
        let (session, _clock) = session();
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"payload").unwrap();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();

        let result = session
            .authenticate_and_protect("alice", Some(&[1.0, 0.0, 0.0]), &file)
            .unwrap();
        assert_eq!(session.remove_user("alice").unwrap(), 1);

        assert!(matches!(
            session.decrypt_file("alice", &result.protected_path),
            Err(VaultError::KeyNotFound { .. })
        ));
        assert!(matches!(session.identity("alice"), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_lock_registry_does_not_grow() {
        let (session, _clock) = session();
        for i in 0..100 {
            let name = format!("ghost{i}");
            assert!(matches!(
                session.authenticate_and_protect(&name, None, Path::new("f")),
                Err(VaultError::NotFound(_))
            ));
            assert!(session.unlock_user(&name).is_err());
        }
        assert_eq!(session.user_locks.len(), 0);

        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();
        session.remove_user("alice").unwrap();
        assert_eq!(session.user_locks.len(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_rejected_before_any_effect() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (session, _clock) = session();
        let dir = tempdir().unwrap();
        let file = dir.path().join(OsStr::from_bytes(b"caf\xff.txt"));
        std::fs::write(&file, b"bytes").unwrap();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();

        assert!(matches!(
            session.authenticate_and_protect("alice", Some(&[1.0, 0.0, 0.0]), &file),
            Err(VaultError::InvalidPath(_))
        ));
        assert!(matches!(
            session.authenticate_and_protect("alice", Some(&[0.0, 1.0, 0.0]), &file),
            Err(VaultError::InvalidPath(_))
        ));
        assert_eq!(session.identity("alice").unwrap().failed_attempts, 0);
        assert!(session.key_vault().list_paths("alice").unwrap().is_empty());
        assert!(!session.fs.protected_path(&file).exists());
        assert!(file.exists());

        assert!(matches!(
            session.decrypt_file("alice", &session.fs.protected_path(&file)),
            Err(VaultError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_unicode_path_round_trip() {
        let (session, _clock) = session();
        let dir = tempdir().unwrap();
        let file = dir.path().join("café résumé.txt");
        std::fs::write(&file, "naïve".as_bytes()).unwrap();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();

        let result = session
            .authenticate_and_protect("alice", Some(&[1.0, 0.0, 0.0]), &file)
            .unwrap();
        assert_eq!(
            session.decrypt_file("alice", &result.protected_path).unwrap(),
            "naïve".as_bytes()
        );
    }

    #[test]
    fn test_token_from_other_pair_fails_integrity() {
        let (session, _clock) = session();
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"first").unwrap();
        std::fs::write(&b, b"second").unwrap();
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();

        let face = [1.0, 0.0, 0.0];
        let protected_a = session.authenticate_and_protect("alice", Some(&face), &a).unwrap();
        let protected_b = session.authenticate_and_protect("alice", Some(&face), &b).unwrap();
        assert_ne!(protected_a.key_fingerprint, protected_b.key_fingerprint);

        std::fs::copy(&protected_b.protected_path, &protected_a.protected_path).unwrap();
        assert!(matches!(
            session.decrypt_file("alice", &protected_a.protected_path),
            Err(VaultError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_concurrent_failures_are_not_lost() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let db = Arc::new(Database::open_in_memory().unwrap());
        let config = VaultConfig {
            descriptor_len: 3,
            max_attempts: 100,
            ..Default::default()
        };
        let session = Arc::new(AuthSession::new(config, db, clock).unwrap());
        session.register("alice", &[1.0, 0.0, 0.0]).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        let _ = session.authenticate_and_protect(
                            "alice",
                            Some(&[0.0, 1.0, 0.0]),
                            Path::new("f"),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(session.identity("alice").unwrap().failed_attempts, 40);
        assert_eq!(session.user_locks.len(), 0);
    }
}
