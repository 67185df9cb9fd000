//! Coffer Store
//!
//! Abstraction over platform hardware-backed credential storage.
//!
//! The [`SecureStore`] trait is the only contract the wallet layer
//! relies on: data survives restarts, is scoped to this application,
//! and may optionally sit behind a [`DeviceAuthGate`] (biometric or
//! device-auth prompt). Two implementations ship here — an in-memory
//! test double and a file-per-key store; platform keychain/keystore
//! bindings implement the same trait out of tree.

pub mod accounts;
pub mod file;
pub mod memory;

use thiserror::Error;

pub use accounts::{Account, AccountStore};
pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("access denied by platform store")]
    AccessDenied,
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Contract a platform credential store must satisfy.
///
/// Keys are short ASCII identifiers chosen by the wallet layer; values
/// are opaque bytes (always ciphertext or non-secret metadata, never raw
/// key material).
pub trait SecureStore: Send + Sync {
    fn save(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn load(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// Optional biometric/device-auth prompt consulted before sensitive
/// loads. Never performs decryption itself.
pub trait DeviceAuthGate: Send + Sync {
    fn authenticate(&self, reason: &str) -> bool;
}

/// Gate that always allows access; the default when no platform
/// authenticator is wired in.
pub struct NoAuthGate;

impl DeviceAuthGate for NoAuthGate {
    fn authenticate(&self, _reason: &str) -> bool {
        true
    }
}
