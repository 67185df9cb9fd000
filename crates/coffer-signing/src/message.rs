//! Chain message-prefixing conventions
//!
//! Both chains prepend a fixed prefix before hashing signed messages so
//! a message signature can never be replayed as a transaction signature.

use sha2::{Digest, Sha256};
use sha3::Keccak256;

const BITCOIN_MESSAGE_PREFIX: &[u8] = b"Bitcoin Signed Message:\n";
const ETHEREUM_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// Bitcoin signed-message digest:
/// `dsha256(varint(24) || "Bitcoin Signed Message:\n" || varint(len) || msg)`.
pub fn bitcoin_message_digest(message: &[u8]) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(message.len() + 34);
    write_varint(&mut preimage, BITCOIN_MESSAGE_PREFIX.len() as u64);
    preimage.extend_from_slice(BITCOIN_MESSAGE_PREFIX);
    write_varint(&mut preimage, message.len() as u64);
    preimage.extend_from_slice(message);
    double_sha256(&preimage)
}

/// Ethereum personal-message digest (EIP-191):
/// `keccak256("\x19Ethereum Signed Message:\n" || decimal(len) || msg)`.
pub fn ethereum_message_digest(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    sha3::Digest::update(&mut hasher, ETHEREUM_MESSAGE_PREFIX);
    sha3::Digest::update(&mut hasher, message.len().to_string().as_bytes());
    sha3::Digest::update(&mut hasher, message);
    sha3::Digest::finalize(hasher).into()
}

pub fn double_sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(bytes)).into()
}

/// Bitcoin compact-size encoding.
fn write_varint(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}
