//! Coffer Wallet
//!
//! The wallet lifecycle manager — the single entry point that composes
//! mnemonic handling, key derivation, encryption, secure storage,
//! backups, and signing into the externally visible API.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized → (create/import/restore) → Unlocked
//!        ↑                                     ↓ lock / auto-lock / background
//!     delete  ←———————  Locked  ⇄ LockedOut (after repeated failures)
//! ```
//!
//! At most one decrypted key tree exists per [`WalletManager`]; every
//! operation serializes through one mutex so a concurrent lock can
//! never observe a half-zeroed key.

pub mod backup;
pub mod error;
pub mod manager;

pub use backup::validate_backup;
pub use error::WalletError;
pub use manager::{ActiveAccount, WalletConfig, WalletManager, WalletSettings, WalletState};
