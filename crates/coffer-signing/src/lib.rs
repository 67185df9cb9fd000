//! Coffer Signing
//!
//! Chain-specific transaction and message signing over secp256k1.
//!
//! The [`Signer`] borrows an unlocked master key from the wallet
//! lifecycle layer, derives per-account keys on demand, and erases every
//! derived private key immediately after producing a signature. Nothing
//! in this crate persists key material.
//!
//! Transaction encoding is deliberately the signing contract only:
//! canonical length-prefixed preimages, not full PSBT or RLP. Callers
//! that broadcast transactions assemble the final wire encoding from the
//! signatures returned here.

pub mod account;
pub mod message;
pub mod signer;
pub mod utxo;

use thiserror::Error;

pub use account::AccountRequest;
pub use signer::{
    recover_pubkey, verify_signature, Signature, SignedMessage, SignedTransaction, Signer,
    TransactionRequest,
};
pub use utxo::{Selection, Utxo, UtxoRequest};

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("unsupported chain for this request: {0}")]
    UnsupportedChain(String),
    #[error("insufficient funds: {available} available, {required} required (amount + fee)")]
    InsufficientFunds { available: u64, required: u64 },
    #[error(transparent)]
    Key(#[from] coffer_core::KeyError),
    #[error("signing failed: {0}")]
    Signature(String),
    #[error("transaction has no outputs")]
    EmptyTransaction,
}
