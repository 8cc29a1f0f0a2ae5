//! ALFA Face Vault - Configuration
//!
//! JSON configuration with defaults for every field. Matching and lockout
//! parameters are calibration values, so they live here instead of in code.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::descriptor::DEFAULT_DESCRIPTOR_LEN;
use crate::error::{VaultError, VaultResult};

/// Environment variable pointing at a config file
pub const CONFIG_ENV: &str = "ALFA_FACE_CONFIG";

/// Environment variable overriding the database path
pub const DATABASE_ENV: &str = "ALFA_FACE_DB";

pub const DEFAULT_DATABASE_PATH: &str = "./alfa_face.db";
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOCKOUT_SECS: u64 = 60;
pub const DEFAULT_PROTECTED_SUFFIX: &str = ".enc";

/// One year
const MAX_LOCKOUT_SECS: u64 = 365 * 24 * 3600;

/// Vault configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// SQLite database holding identities and file keys
    pub database_path: PathBuf,
    /// Maximum descriptor distance still accepted as a match
    pub match_threshold: f64,
    /// Consecutive failures before lockout
    pub max_attempts: u32,
    /// Lockout length (seconds)
    pub lockout_duration_secs: u64,
    /// Descriptor length expected from the extractor
    pub descriptor_len: usize,
    /// Suffix appended to protected files
    pub protected_suffix: String,
    /// Overwrite and delete the target file when a lockout triggers
    pub shred_on_lockout: bool,
    /// JSON-lines audit file
    pub audit_log: Option<PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration_secs: DEFAULT_LOCKOUT_SECS,
            descriptor_len: DEFAULT_DESCRIPTOR_LEN,
            protected_suffix: DEFAULT_PROTECTED_SUFFIX.into(),
            shred_on_lockout: false,
            audit_log: None,
        }
    }
}

impl VaultConfig {
    /// Read a config file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VaultError::FileNotFound(path.display().to_string()));
        }

        let data = std::fs::read(path)?;
        let config: VaultConfig = serde_json::from_slice(&data)
            .map_err(|e| VaultError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve from an explicit path, then `ALFA_FACE_CONFIG`, then defaults.
    /// `ALFA_FACE_DB` overrides the database path in every case.
    pub fn resolve(explicit: Option<&Path>) -> VaultResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => Self::load(PathBuf::from(path))?,
                None => Self::default(),
            },
        };

        if let Some(db) = std::env::var_os(DATABASE_ENV) {
            config.database_path = PathBuf::from(db);
        }

        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> VaultResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> VaultResult<()> {
        if !self.match_threshold.is_finite() || self.match_threshold <= 0.0 {
            return Err(VaultError::InvalidConfig(format!(
                "match_threshold must be a positive number, got {}",
                self.match_threshold
            )));
        }
        if self.max_attempts == 0 {
            return Err(VaultError::InvalidConfig("max_attempts must be at least 1".into()));
        }
        if self.descriptor_len == 0 {
            return Err(VaultError::InvalidConfig("descriptor_len must be at least 1".into()));
        }
        if self.protected_suffix.is_empty() {
            return Err(VaultError::InvalidConfig("protected_suffix must not be empty".into()));
        }
        if self.lockout_duration_secs > MAX_LOCKOUT_SECS {
            return Err(VaultError::InvalidConfig("lockout_duration_secs is too large".into()));
        }
        Ok(())
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::seconds(self.lockout_duration_secs.min(MAX_LOCKOUT_SECS) as i64)
    }
}
