//! Unified wallet error type
//!
//! Lifecycle-state violations (`WalletLocked`, `NotInitialized`) are
//! distinct variants so callers can route to an unlock prompt instead
//! of a generic failure. Wrong password and corrupted ciphertext both
//! surface as the underlying `AuthenticationFailed` crypto error — the
//! cipher layer does not distinguish them.

use coffer_core::mnemonic::MnemonicError;
use coffer_core::password::PolicyViolation;
use coffer_core::{ChainType, CryptoError, KeyError};
use coffer_signing::SigningError;
use coffer_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("a wallet already exists")]
    WalletAlreadyExists,
    #[error("no wallet has been created")]
    NotInitialized,
    #[error("wallet is locked")]
    WalletLocked,
    #[error("password too weak: {0}")]
    PasswordTooWeak(#[from] PolicyViolation),
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("too many failed attempts, retry in {retry_in_secs}s")]
    AuthenticationAttemptsExceeded { retry_in_secs: u64 },
    #[error("device authentication denied")]
    DeviceAuthDenied,
    #[error("incompatible backup version {0}")]
    IncompatibleBackupVersion(u16),
    #[error("backup integrity check failed")]
    BackupIntegrityFailure,
    #[error("account not found: {chain} #{index}")]
    AccountNotFound { chain: ChainType, index: u32 },

    #[error(transparent)]
    Mnemonic(#[from] MnemonicError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl WalletError {
    /// Whether this error should send the UI to an unlock prompt.
    pub fn requires_unlock(&self) -> bool {
        matches!(self, Self::WalletLocked)
    }
}
