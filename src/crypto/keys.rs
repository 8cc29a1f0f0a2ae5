//! ALFA Face Vault - Key Material

use std::fmt;

use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{VaultError, VaultResult};

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// Per-file symmetric key, zeroized on drop
pub struct FileKey {
    inner: Secret<[u8; KEY_LEN]>,
}

impl FileKey {
    /// Create a key from bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// Create a key from a stored blob
    pub fn from_slice(bytes: &[u8]) -> VaultResult<Self> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            VaultError::Storage(format!(
                "invalid key length: expected {}, got {}",
                KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self::new(bytes))
    }

    /// Generate a random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// Short SHA-256 fingerprint, safe to log
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.expose());
        hex::encode(&digest[..8])
    }
}

impl Clone for FileKey {
    fn clone(&self) -> Self {
        Self::new(*self.expose())
    }
}

/// Constant-time comparison
impl PartialEq for FileKey {
    fn eq(&self, other: &Self) -> bool {
        self.expose()[..].ct_eq(&other.expose()[..]).into()
    }
}

impl Eq for FileKey {}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        let a = FileKey::generate();
        let b = FileKey::generate();
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_equality_checks_every_byte() {
        let mut bytes = [7u8; KEY_LEN];
        assert_eq!(FileKey::new(bytes), FileKey::new(bytes));
        bytes[KEY_LEN - 1] ^= 1;
        assert_ne!(FileKey::new([7u8; KEY_LEN]), FileKey::new(bytes));
    }

    #[test]
    fn test_debug_hides_bytes() {
        let key = FileKey::new([0xAB; KEY_LEN]);
        let shown = format!("{:?}", key);
        assert!(shown.contains(&key.fingerprint()));
        assert!(!shown.contains("abababab"));
    }

    #[test]
    fn test_from_slice_checks_length() {
        assert!(FileKey::from_slice(&[1u8; KEY_LEN]).is_ok());
        assert!(matches!(FileKey::from_slice(&[1u8; 16]), Err(VaultError::Storage(_))));
    }
}
