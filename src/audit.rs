//! ALFA Face Vault - Audit Trail
//!
//! Every user-facing operation leaves one event: who, what, outcome, when.
//! Events go to the `alfa_face::audit` log target and, when configured, to
//! a JSON-lines file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

pub const AUDIT_TARGET: &str = "alfa_face::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Register,
    CreateAccount,
    UpdateDescriptor,
    Authenticate,
    Decrypt,
    Unlock,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub action: AuditAction,
    /// `"ok"` or the error code
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEvent {
    pub fn new<T>(
        timestamp: DateTime<Utc>,
        username: &str,
        action: AuditAction,
        result: &VaultResult<T>,
    ) -> Self {
        let (outcome, detail) = match result {
            Ok(_) => ("ok".to_string(), None),
            Err(e) => (e.code().to_string(), Some(e.to_string())),
        };

        Self {
            timestamp,
            username: username.to_string(),
            action,
            outcome,
            detail,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == "ok"
    }
}

/// Audit sink
pub struct AuditTrail {
    file: Option<Mutex<File>>,
}

impl AuditTrail {
    /// Log-only trail
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Append events to `path` in addition to the log
    pub fn open<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    /// Record an event. Sink failures are logged, never returned.
    pub fn record(&self, event: &AuditEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                log::warn!(target: AUDIT_TARGET, "failed to serialize audit event: {}", e);
                return;
            }
        };

        if event.is_ok() {
            log::info!(target: AUDIT_TARGET, "{}", line);
        } else {
            log::warn!(target: AUDIT_TARGET, "{}", line);
        }

        if let Some(file) = &self.file {
            let mut file = file.lock();
            if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
                log::warn!(target: AUDIT_TARGET, "failed to append audit event: {}", e);
            }
        }
    }
}

/// Parse a JSON-lines audit file
pub fn read_events<P: AsRef<Path>>(path: P) -> VaultResult<Vec<AuditEvent>> {
    let data = std::fs::read_to_string(path)?;
    data.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(VaultError::from))
        .collect()
}
