//! ALFA Face Vault - Cryptographic Core
//!
//! Per-file keys and AES-256-GCM file tokens.

pub mod keys;
pub mod aead;

pub use keys::*;
pub use aead::*;
