//! ALFA Face Vault - Error Types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // IDENTITY ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("User already exists: {0}")]
    AlreadyExists(String),

    #[error("User {0} has no enrolled face descriptor")]
    NotEnrolled(String),

    // ═══════════════════════════════════════════════════════════════
    // AUTHENTICATION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("No face detected")]
    NoFaceDetected,

    #[error("Too many failed attempts - locked until {until}")]
    LockedOut { until: DateTime<Utc> },

    #[error("Face recognition failed ({remaining} attempt(s) left)")]
    AuthenticationFailed { remaining: u32 },

    // ═══════════════════════════════════════════════════════════════
    // DESCRIPTOR ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Descriptor has zero norm and cannot be normalized")]
    DegenerateVector,

    #[error("Descriptor length mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // ═══════════════════════════════════════════════════════════════
    // KEY / CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("No key stored for {username} / {path}")]
    KeyNotFound { username: String, path: String },

    #[error("Authentication failed - file corrupted, truncated or wrong key")]
    AuthenticationFailure,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // FILE / STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Path is not valid UTF-8: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    // ═══════════════════════════════════════════════════════════════
    // CONFIG / SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl VaultError {
    /// Stable identifier used in audit records
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::NotFound(_) => "not_found",
            VaultError::AlreadyExists(_) => "already_exists",
            VaultError::NotEnrolled(_) => "not_enrolled",
            VaultError::NoFaceDetected => "no_face_detected",
            VaultError::LockedOut { .. } => "locked_out",
            VaultError::AuthenticationFailed { .. } => "authentication_failed",
            VaultError::DegenerateVector => "degenerate_vector",
            VaultError::DimensionMismatch { .. } => "dimension_mismatch",
            VaultError::KeyNotFound { .. } => "key_not_found",
            VaultError::AuthenticationFailure => "integrity_failure",
            VaultError::EncryptionFailed(_) => "encryption_failed",
            VaultError::FileNotFound(_) => "file_not_found",
            VaultError::InvalidPath(_) => "invalid_path",
            VaultError::Io(_) => "io_error",
            VaultError::Storage(_) => "storage_error",
            VaultError::InvalidConfig(_) => "invalid_config",
            VaultError::Serialization(_) => "serialization_error",
        }
    }

    /// Check if this is a security-critical error
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            VaultError::AuthenticationFailure
                | VaultError::LockedOut { .. }
                | VaultError::AuthenticationFailed { .. }
        )
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        VaultError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}
