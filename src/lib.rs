//! # ALFA Face Vault
//!
//! Face-gated file protection with per-file key custody.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    ALFA FACE VAULT                       │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │  CAPTURE    │  │ AUTH SESSION│  │  AUDIT TRAIL    │  │
//! │  │  FEED       │─▶│ match+lock  │─▶│  (JSON lines)   │  │
//! │  └─────────────┘  └──────┬──────┘  └─────────────────┘  │
//! │                          │                               │
//! │  ┌─────────────┐  ┌──────┴──────┐  ┌─────────────────┐  │
//! │  │ IDENTITIES  │  │  KEY VAULT  │  │  FILE CIPHER    │  │
//! │  │ + LOCKOUT   │  │ (user,path) │  │  AES-256-GCM    │  │
//! │  └──────┬──────┘  └──────┬──────┘  └─────────────────┘  │
//! │         └────────┬───────┘                               │
//! │           ┌──────┴──────┐                                │
//! │           │   SQLITE    │                                │
//! │           └─────────────┘                                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Identities carry a unit-norm face descriptor; a match is a Euclidean
//!   distance below the configured threshold
//! - Consecutive failures lock the identity for a fixed window
//! - One random 256-bit key per (user, file), reused on every re-protect
//! - Protected files are authenticated: any tampering fails decryption
//! - Key material is zeroized on drop

pub mod audit;
pub mod config;
pub mod crypto;
pub mod descriptor;
pub mod error;
pub mod feed;
pub mod identity;
pub mod keyvault;
pub mod lockout;
pub mod secure_fs;
pub mod session;
pub mod store;

pub use config::VaultConfig;
pub use crypto::{FileCipher, FileKey};
pub use descriptor::{distance, normalize, Descriptor};
pub use error::{VaultError, VaultResult};
pub use feed::{snapshot_channel, DescriptorSnapshot, DescriptorSource, Sampler};
pub use identity::{Identity, IdentityStore, Role};
pub use keyvault::KeyVault;
pub use lockout::{Clock, LockState, LockoutPolicy, ManualClock, SystemClock};
pub use session::{AuthSession, ProtectResult};
pub use store::Database;

/// ALFA Face Vault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
