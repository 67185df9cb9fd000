//! Coffer Core
//!
//! Cryptographic primitives for the Coffer multi-chain wallet.
//!
//! # Key Derivation
//!
//! From a single BIP-39 seed:
//! - Bitcoin keys via BIP-84: m/84'/0'/account'/change/index
//! - Ethereum keys via BIP-44: m/44'/60'/account'/0/index
//!
//! # Encrypted Storage
//!
//! Seeds and mnemonics are encrypted at rest using Argon2id + AES-256-GCM.
//! KDF cost parameters travel with every ciphertext so they can be raised
//! later without invalidating old blobs.

pub mod chain;
pub mod crypto;
pub mod hdkey;
pub mod memory;
pub mod mnemonic;
pub mod password;

pub use chain::ChainType;
pub use crypto::{CryptoError, EncryptedBlob, KdfParams, PasswordVerifier};
pub use hdkey::KeyError;
pub use mnemonic::{MnemonicError, Strength};
