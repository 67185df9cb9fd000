//! BIP-39 mnemonic management
//!
//! Handles entropy generation, mnemonic encoding/validation, and seed
//! derivation. All bit-level work (checksum, 11-bit word indices,
//! PBKDF2-HMAC-SHA512 with 2048 rounds over the NFKD-normalized phrase)
//! happens inside the `bip39` crate, which is bit-exact with the standard.

use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Error, Debug)]
pub enum MnemonicError {
    #[error("invalid word count: {0} (expected 12, 15, 18, 21, or 24)")]
    InvalidWordCount(usize),
    #[error("unknown word at position {0}")]
    UnknownWord(usize),
    #[error("mnemonic checksum mismatch")]
    ChecksumMismatch,
    #[error("invalid entropy length: {0} bytes (expected 16, 20, 24, 28, or 32)")]
    InvalidEntropyLength(usize),
    #[error("entropy source failure: {0}")]
    EntropySource(String),
    #[error("invalid mnemonic: {0}")]
    Invalid(String),
}

/// Entropy strength for mnemonic generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Bits128,
    Bits160,
    Bits192,
    Bits224,
    Bits256,
}

impl Strength {
    /// Entropy length in bytes.
    pub fn byte_len(self) -> usize {
        match self {
            Self::Bits128 => 16,
            Self::Bits160 => 20,
            Self::Bits192 => 24,
            Self::Bits224 => 28,
            Self::Bits256 => 32,
        }
    }

    /// Number of mnemonic words this strength encodes to.
    pub fn word_count(self) -> usize {
        // 11 bits per word: (entropy + entropy/32) / 11
        self.byte_len() * 3 / 4
    }

    pub fn from_word_count(words: usize) -> Result<Self, MnemonicError> {
        match words {
            12 => Ok(Self::Bits128),
            15 => Ok(Self::Bits160),
            18 => Ok(Self::Bits192),
            21 => Ok(Self::Bits224),
            24 => Ok(Self::Bits256),
            n => Err(MnemonicError::InvalidWordCount(n)),
        }
    }
}

/// Generate a new mnemonic from fresh OS entropy.
pub fn generate_mnemonic(strength: Strength) -> Result<Mnemonic, MnemonicError> {
    let mut entropy = Zeroizing::new(vec![0u8; strength.byte_len()]);
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| MnemonicError::EntropySource(e.to_string()))?;
    from_entropy(&entropy)
}

/// Build a mnemonic from caller-supplied entropy (test vectors, dice rolls).
pub fn from_entropy(entropy: &[u8]) -> Result<Mnemonic, MnemonicError> {
    if !matches!(entropy.len(), 16 | 20 | 24 | 28 | 32) {
        return Err(MnemonicError::InvalidEntropyLength(entropy.len()));
    }
    Mnemonic::from_entropy_in(Language::English, entropy).map_err(map_bip39_error)
}

/// Parse and validate a mnemonic phrase.
pub fn parse_mnemonic(words: &str) -> Result<Mnemonic, MnemonicError> {
    Mnemonic::parse_in(Language::English, words).map_err(map_bip39_error)
}

/// Whether a phrase is a well-formed mnemonic (word count, wordlist, checksum).
pub fn validate(words: &str) -> bool {
    parse_mnemonic(words).is_ok()
}

/// Derive the 64-byte BIP-39 seed from a mnemonic and optional passphrase.
pub fn derive_seed(mnemonic: &Mnemonic, passphrase: &str) -> Zeroizing<[u8; 64]> {
    Zeroizing::new(mnemonic.to_seed(passphrase))
}

fn map_bip39_error(err: bip39::Error) -> MnemonicError {
    match err {
        bip39::Error::BadWordCount(n) => MnemonicError::InvalidWordCount(n),
        bip39::Error::UnknownWord(i) => MnemonicError::UnknownWord(i),
        bip39::Error::InvalidChecksum => MnemonicError::ChecksumMismatch,
        bip39::Error::BadEntropyBitCount(bits) => {
            MnemonicError::InvalidEntropyLength(bits / 8)
        }
        other => MnemonicError::Invalid(other.to_string()),
    }
}
