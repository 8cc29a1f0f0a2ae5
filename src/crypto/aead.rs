//! ALFA Face Vault - File Cipher
//!
//! Token format of a protected file:
//! ```text
//! [MAGIC 8B]["ALFAFACE"]
//! [VERSION 1B][0x01]
//! [NONCE 12B][random]
//! [CIPHERTEXT variable][AES-256-GCM encrypted]
//! [TAG 16B][GCM auth tag]
//! ```
//! The 21-byte header is authenticated as associated data, so a flipped
//! version or magic byte fails the same way a tampered ciphertext does.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};

use super::keys::{generate_nonce, FileKey, NONCE_LEN};
use crate::error::{VaultError, VaultResult};

/// Magic bytes identifying an ALFA Face Vault token
pub const MAGIC: &[u8; 8] = b"ALFAFACE";

/// Current format version
pub const VERSION: u8 = 0x01;

/// GCM authentication tag size
pub const TAG_LEN: usize = 16;

/// Header size: MAGIC(8) + VERSION(1) + NONCE(12)
pub const HEADER_LEN: usize = MAGIC.len() + 1 + NONCE_LEN;

/// Minimum valid token size (empty plaintext)
pub const MIN_TOKEN_LEN: usize = HEADER_LEN + TAG_LEN;

/// Authenticated file encryption
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCipher;

impl FileCipher {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt `plaintext` into a self-describing token
    pub fn encrypt(&self, plaintext: &[u8], key: &FileKey) -> VaultResult<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(key.expose())
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

        let nonce_bytes = generate_nonce();

        let mut token = Vec::with_capacity(MIN_TOKEN_LEN + plaintext.len());
        token.extend_from_slice(MAGIC);
        token.push(VERSION);
        token.extend_from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: &token[..HEADER_LEN],
                },
            )
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

        token.extend_from_slice(&ciphertext);
        Ok(token)
    }

    /// Verify and decrypt a token produced by [`FileCipher::encrypt`]
    pub fn decrypt(&self, token: &[u8], key: &FileKey) -> VaultResult<Vec<u8>> {
        if token.len() < MIN_TOKEN_LEN {
            log::debug!("token rejected: {} bytes is shorter than a header and tag", token.len());
            return Err(VaultError::AuthenticationFailure);
        }

        let (header, ciphertext) = token.split_at(HEADER_LEN);
        if &header[..MAGIC.len()] != MAGIC {
            log::debug!("token rejected: bad magic");
            return Err(VaultError::AuthenticationFailure);
        }
        if header[MAGIC.len()] != VERSION {
            log::debug!("token rejected: unsupported version {}", header[MAGIC.len()]);
            return Err(VaultError::AuthenticationFailure);
        }

        let cipher = Aes256Gcm::new_from_slice(key.expose())
            .map_err(|_| VaultError::AuthenticationFailure)?;
        let nonce = Nonce::from_slice(&header[MAGIC.len() + 1..]);

        cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: header,
                },
            )
            .map_err(|_| VaultError::AuthenticationFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let cipher = FileCipher::new();
        let key = FileKey::generate();
        let plaintext = b"ALFA Face Vault - quarterly report";

        let token = cipher.encrypt(plaintext, &key).unwrap();
        assert_eq!(&token[..8], MAGIC);
        assert_eq!(token[8], VERSION);
        assert_eq!(token.len(), MIN_TOKEN_LEN + plaintext.len());
        assert_eq!(cipher.decrypt(&token, &key).unwrap(), plaintext);
    }

    #[test]
    fn test_empty_plaintext() {
        let cipher = FileCipher::new();
        let key = FileKey::generate();
        let token = cipher.encrypt(b"", &key).unwrap();
        assert!(cipher.decrypt(&token, &key).unwrap().is_empty());
    }

    #[test]
    fn test_encryption_is_not_deterministic() {
        let cipher = FileCipher::new();
        let key = FileKey::generate();

        let a = cipher.encrypt(b"same bytes", &key).unwrap();
        let b = cipher.encrypt(b"same bytes", &key).unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a, &key).unwrap(), cipher.decrypt(&b, &key).unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher = FileCipher::new();
        let token = cipher.encrypt(b"Secret data", &FileKey::generate()).unwrap();
        assert!(matches!(
            cipher.decrypt(&token, &FileKey::generate()),
            Err(VaultError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_tampering_detected() {
        let cipher = FileCipher::new();
        let key = FileKey::generate();
        let token = cipher.encrypt(b"Secret data", &key).unwrap();

        for index in [0, 8, HEADER_LEN - 1, HEADER_LEN, token.len() - 1] {
            let mut tampered = token.clone();
            tampered[index] ^= 0x01;
            assert!(matches!(
                cipher.decrypt(&tampered, &key),
                Err(VaultError::AuthenticationFailure)
            ));
        }
    }

    #[test]
    fn test_truncation_detected() {
        let cipher = FileCipher::new();
        let key = FileKey::generate();
        let token = cipher.encrypt(b"Secret data", &key).unwrap();

        for len in [0, 5, HEADER_LEN, MIN_TOKEN_LEN, token.len() - 1] {
            assert!(matches!(
                cipher.decrypt(&token[..len], &key),
                Err(VaultError::AuthenticationFailure)
            ));
        }
    }
}
