//! ALFA Face Vault - Lockout Policy
//!
//! Failed-attempt counter with a fixed-expiry lock. Expiry is checked when
//! an identity is accessed; nothing runs in the background to unlock.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::VaultConfig;
use crate::identity::Identity;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = *now + by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Lock state of an identity at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum LockState {
    Open,
    Locked { until: DateTime<Utc> },
}

/// Counter update produced by a failed match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureUpdate {
    pub failed_attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
}

/// Lockout parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Lock after this many consecutive failures
    pub max_attempts: u32,
    /// Cooldown period after lockout
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::from_config(&VaultConfig::default())
    }
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            max_attempts,
            lockout_duration,
        }
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(config.max_attempts, config.lockout_duration())
    }

    /// Current state; an expired lock reads as `Open`
    pub fn state_of(&self, identity: &Identity, now: DateTime<Utc>) -> LockState {
        match identity.lockout_until {
            Some(until) if now < until => LockState::Locked { until },
            _ => LockState::Open,
        }
    }

    /// True when a lock was set and has since expired
    pub fn has_expired_lock(&self, identity: &Identity, now: DateTime<Utc>) -> bool {
        matches!(identity.lockout_until, Some(until) if now >= until)
    }

    /// Apply one failed match.
    ///
    /// Returns `None` while the identity is still locked: the attempt is
    /// rejected without touching the counter or extending the lock.
    pub fn on_failure(&self, identity: &Identity, now: DateTime<Utc>) -> Option<FailureUpdate> {
        if let LockState::Locked { .. } = self.state_of(identity, now) {
            return None;
        }

        let previous = if self.has_expired_lock(identity, now) {
            0
        } else {
            identity.failed_attempts
        };

        let failed_attempts = previous.saturating_add(1);
        let lockout_until = if failed_attempts >= self.max_attempts {
            Some(now + self.lockout_duration)
        } else {
            None
        };

        Some(FailureUpdate {
            failed_attempts,
            lockout_until,
        })
    }

    /// Attempts left before the next failure locks the identity
    pub fn remaining_attempts(&self, identity: &Identity, now: DateTime<Utc>) -> u32 {
        match self.state_of(identity, now) {
            LockState::Locked { .. } => 0,
            LockState::Open if self.has_expired_lock(identity, now) => self.max_attempts,
            LockState::Open => self.max_attempts.saturating_sub(identity.failed_attempts),
        }
    }

    /// Lockout remaining time (seconds)
    pub fn lockout_remaining(&self, identity: &Identity, now: DateTime<Utc>) -> Option<i64> {
        match self.state_of(identity, now) {
            LockState::Locked { until } => Some((until - now).num_seconds().max(0)),
            LockState::Open => None,
        }
    }
}
