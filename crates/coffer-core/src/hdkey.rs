//! BIP-32/44 hierarchical key derivation
//!
//! Thin layer over `bitcoin::bip32`, which implements the standard's
//! child-key rules exactly: HMAC-SHA512 per level, mod-n reduction of
//! IL + parent key, and index-skip when IL ≥ n or the child key is zero.
//!
//! Callers never build raw paths for accounts — they supply
//! account/change/address indices and the per-chain path layout is fixed
//! here, so a malformed derivation cannot reach the curve code.

use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::{Secp256k1, Signing};
use bitcoin::Network;
use thiserror::Error;

use crate::chain::ChainType;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("invalid seed length: {0} bytes (expected 16 to 64)")]
    InvalidSeedLength(usize),
    #[error("derivation failed: {0}")]
    Derivation(String),
    #[error("invalid derivation path: {0}")]
    InvalidPath(String),
}

/// Build the master extended key from a BIP-39 seed.
pub fn master_from_seed(seed: &[u8]) -> Result<Xpriv, KeyError> {
    if seed.len() < 16 || seed.len() > 64 {
        return Err(KeyError::InvalidSeedLength(seed.len()));
    }
    Xpriv::new_master(Network::Bitcoin, seed).map_err(|e| KeyError::Derivation(e.to_string()))
}

/// Derive a child key along a path, left to right.
pub fn derive_path<C: Signing>(
    secp: &Secp256k1<C>,
    master: &Xpriv,
    path: &DerivationPath,
) -> Result<Xpriv, KeyError> {
    master
        .derive_priv(secp, path)
        .map_err(|e| KeyError::Derivation(e.to_string()))
}

/// Derive a single child by index (hardened when `index >= 2^31`).
pub fn derive_child<C: Signing>(
    secp: &Secp256k1<C>,
    parent: &Xpriv,
    index: u32,
) -> Result<Xpriv, KeyError> {
    let child = ChildNumber::from(index);
    parent
        .derive_priv(secp, &[child])
        .map_err(|e| KeyError::Derivation(e.to_string()))
}

/// Fixed account-level path for a chain: purpose' / coin_type' / account' / change / index.
pub fn account_path(
    chain: ChainType,
    account: u32,
    change: u32,
    index: u32,
) -> Result<DerivationPath, KeyError> {
    let hardened = |i: u32| {
        ChildNumber::from_hardened_idx(i).map_err(|e| KeyError::InvalidPath(e.to_string()))
    };
    let normal = |i: u32| {
        ChildNumber::from_normal_idx(i).map_err(|e| KeyError::InvalidPath(e.to_string()))
    };
    Ok(DerivationPath::from(vec![
        hardened(chain.purpose())?,
        hardened(chain.coin_type())?,
        hardened(account)?,
        normal(change)?,
        normal(index)?,
    ]))
}

/// Public extended key for a private one.
pub fn to_xpub<C: Signing>(secp: &Secp256k1<C>, key: &Xpriv) -> Xpub {
    Xpub::from_priv(secp, key)
}
