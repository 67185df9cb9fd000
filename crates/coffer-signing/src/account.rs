//! Account-model (Ethereum-style) transaction requests
//!
//! The preimage is a canonical length-prefixed serialization hashed with
//! Keccak-256 — the signing contract only, not RLP. The broadcasting
//! layer RLP-encodes the final transaction around the signature.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// An account-model spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRequest {
    pub nonce: u64,
    /// Gas price in wei.
    pub gas_price: u128,
    pub gas_limit: u64,
    /// Recipient address, 0x-prefixed hex. Empty for contract creation.
    pub to: String,
    /// Value in wei.
    pub value: u128,
    /// Call data.
    pub data: Vec<u8>,
    /// EIP-155 chain id; bound into both the digest and the v value.
    pub chain_id: u64,
}

impl AccountRequest {
    /// Keccak-256 signing digest over all fields, length-prefixed.
    pub fn signing_digest(&self) -> [u8; 32] {
        let mut preimage = Vec::new();
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        preimage.extend_from_slice(&self.gas_price.to_be_bytes());
        preimage.extend_from_slice(&self.gas_limit.to_be_bytes());
        preimage.extend_from_slice(&(self.to.len() as u32).to_be_bytes());
        preimage.extend_from_slice(self.to.as_bytes());
        preimage.extend_from_slice(&self.value.to_be_bytes());
        preimage.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        preimage.extend_from_slice(&self.data);
        preimage.extend_from_slice(&self.chain_id.to_be_bytes());
        Keccak256::digest(&preimage).into()
    }

    /// EIP-155 recovery value: `chain_id * 2 + 35 + recovery_id`.
    pub fn v(&self, recovery_id: u8) -> u64 {
        self.chain_id * 2 + 35 + u64::from(recovery_id)
    }
}
