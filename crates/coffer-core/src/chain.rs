//! Supported chains and public-key-to-address transforms.
//!
//! Both chains sign over secp256k1. Bitcoin addresses are BIP-84 native
//! segwit (P2WPKH); Ethereum addresses are the last 20 bytes of the
//! Keccak-256 hash of the uncompressed public key, rendered with the
//! EIP-55 mixed-case checksum.

use bitcoin::bip32::Xpriv;
use bitcoin::secp256k1::{PublicKey, Secp256k1, Signing};
use bitcoin::{Address, CompressedPublicKey, Network};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Chain family an account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    /// UTXO model, BIP-84 P2WPKH addresses.
    Bitcoin,
    /// Account model, EIP-55 addresses.
    Ethereum,
}

impl ChainType {
    /// BIP-44 coin type for this chain.
    pub fn coin_type(self) -> u32 {
        match self {
            Self::Bitcoin => 0,
            Self::Ethereum => 60,
        }
    }

    /// Derivation purpose: BIP-84 for native segwit Bitcoin, BIP-44 for Ethereum.
    pub fn purpose(self) -> u32 {
        match self {
            Self::Bitcoin => 84,
            Self::Ethereum => 44,
        }
    }
}

impl std::fmt::Display for ChainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bitcoin => write!(f, "bitcoin"),
            Self::Ethereum => write!(f, "ethereum"),
        }
    }
}

/// Compute the display address for a derived key.
pub fn address_for<C: Signing>(
    secp: &Secp256k1<C>,
    key: &Xpriv,
    chain: ChainType,
    network: Network,
) -> String {
    let pubkey = key.private_key.public_key(secp);
    match chain {
        ChainType::Bitcoin => bitcoin_address(&pubkey, network).to_string(),
        ChainType::Ethereum => ethereum_address(&pubkey),
    }
}

/// P2WPKH address for a compressed public key.
pub fn bitcoin_address(pubkey: &PublicKey, network: Network) -> Address {
    Address::p2wpkh(&CompressedPublicKey(*pubkey), network)
}

/// EIP-55 checksummed Ethereum address from a secp256k1 public key.
///
/// Keccak-256 over the 64-byte uncompressed point (0x04 prefix stripped),
/// keeping the final 20 bytes.
pub fn ethereum_address(pubkey: &PublicKey) -> String {
    let uncompressed = pubkey.serialize_uncompressed();
    let hash = Keccak256::digest(&uncompressed[1..]);
    eip55_checksum(&hash[12..])
}

/// Apply the EIP-55 mixed-case checksum to a 20-byte address.
fn eip55_checksum(addr: &[u8]) -> String {
    let lower = hex::encode(addr);
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (4 * (1 - i % 2))) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::SecretKey;

    fn pubkey_from_hex(sk_hex: &str) -> PublicKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&hex::decode(sk_hex).unwrap()).unwrap();
        sk.public_key(&secp)
    }

    #[test]
    fn test_coin_types() {
        assert_eq!(ChainType::Bitcoin.coin_type(), 0);
        assert_eq!(ChainType::Ethereum.coin_type(), 60);
        assert_eq!(ChainType::Bitcoin.purpose(), 84);
        assert_eq!(ChainType::Ethereum.purpose(), 44);
    }

    /// EIP-55 reference vectors from the EIP itself.
    #[test]
    fn test_eip55_reference_vectors() {
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let raw = hex::decode(&expected[2..]).unwrap();
            assert_eq!(eip55_checksum(&raw), expected);
        }
    }

    /// Well-known vector: the private key 0x01 maps to the secp256k1
    /// generator point, whose Ethereum address is fixed.
    #[test]
    fn test_ethereum_address_generator_point() {
        let pubkey = pubkey_from_hex(
            "0000000000000000000000000000000000000000000000000000000000000001",
        );
        assert_eq!(
            ethereum_address(&pubkey),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn test_bitcoin_address_is_bech32() {
        let pubkey = pubkey_from_hex(
            "0000000000000000000000000000000000000000000000000000000000000001",
        );
        let addr = bitcoin_address(&pubkey, Network::Bitcoin).to_string();
        assert!(addr.starts_with("bc1q"), "expected P2WPKH, got {addr}");
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&ChainType::Ethereum).unwrap();
        assert_eq!(json, "\"ethereum\"");
        let back: ChainType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ChainType::Ethereum);
    }
}
