//! Cryptographic utilities
//!
//! Password-based encryption for seed and backup storage using
//! Argon2id + AES-256-GCM.
//!
//! # Security Notes
//!
//! - Argon2id is memory-hard (resistant to GPU/ASIC attacks)
//! - AES-256-GCM provides authenticated encryption; tag mismatch never
//!   yields partial plaintext
//! - Each encryption uses a fresh random salt and nonce
//! - KDF cost parameters are serialized into every blob so they can be
//!   raised later without invalidating existing ciphertexts
//! - Derived keys live in `Zeroizing` buffers and are erased on every
//!   exit path

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

/// Argon2id defaults (OWASP recommendations for 2024+)
/// - m_cost: 64 MiB memory
/// - t_cost: 3 iterations
/// - p_cost: 4 parallel lanes
const DEFAULT_M_COST: u32 = 65536;
const DEFAULT_T_COST: u32 = 3;
const DEFAULT_P_COST: u32 = 4;

/// Derived key length (256 bits for AES-256)
const KEY_LEN: usize = 32;

/// Salt length for Argon2id
pub const SALT_LEN: usize = 16;

/// Nonce length for AES-256-GCM
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length
pub const TAG_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: authentication tag mismatch")]
    AuthenticationFailed,
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("invalid ciphertext format")]
    InvalidFormat,
    #[error("randomness source failure: {0}")]
    Rng(String),
}

/// Argon2id cost parameters, stored alongside every ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: DEFAULT_M_COST,
            t_cost: DEFAULT_T_COST,
            p_cost: DEFAULT_P_COST,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests; never use outside test builds.
    pub fn fast_insecure() -> Self {
        Self {
            m_cost: 64,
            t_cost: 1,
            p_cost: 1,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.m_cost.to_be_bytes());
        out.extend_from_slice(&self.t_cost.to_be_bytes());
        out.extend_from_slice(&self.p_cost.to_be_bytes());
    }

    fn read_from(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < 12 {
            return Err(CryptoError::InvalidFormat);
        }
        let u32_at = |i: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[i..i + 4]);
            u32::from_be_bytes(buf)
        };
        Ok(Self {
            m_cost: u32_at(0),
            t_cost: u32_at(4),
            p_cost: u32_at(8),
        })
    }
}

/// Nonce + ciphertext pair produced by raw-key AEAD encryption.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the 16-byte authentication tag appended.
    pub ciphertext: Vec<u8>,
}

/// Encrypt with a raw 32-byte key. Fresh random nonce per call.
pub fn seal(plaintext: &[u8], key: &[u8; KEY_LEN]) -> Result<Sealed, CryptoError> {
    let nonce_arr = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&nonce_arr);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(Sealed { nonce, ciphertext })
}

/// Decrypt with a raw 32-byte key. Fails closed on any tag mismatch.
pub fn open(sealed: &Sealed, key: &[u8; KEY_LEN]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            sealed.ciphertext.as_slice(),
        )
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    Ok(Zeroizing::new(plaintext))
}

/// Derive a 32-byte encryption key from a password using Argon2id.
pub fn derive_key(
    password: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    let argon_params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_LEN))
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, key.as_mut())
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    Ok(key)
}

/// Password-encrypted blob.
///
/// Wire format (big-endian):
/// `[m_cost u32][t_cost u32][p_cost u32][salt 16][nonce 12][ciphertext + tag]`
#[derive(Debug, Clone)]
pub struct EncryptedBlob {
    pub params: KdfParams,
    pub salt: [u8; SALT_LEN],
    pub sealed: Sealed,
}

impl EncryptedBlob {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(12 + SALT_LEN + NONCE_LEN + self.sealed.ciphertext.len());
        self.params.write_to(&mut bytes);
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.sealed.nonce);
        bytes.extend_from_slice(&self.sealed.ciphertext);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        // params + salt + nonce + at least one byte of ciphertext + tag
        if bytes.len() < 12 + SALT_LEN + NONCE_LEN + TAG_LEN + 1 {
            return Err(CryptoError::InvalidFormat);
        }
        let params = KdfParams::read_from(bytes)?;

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[12..12 + SALT_LEN]);

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[12 + SALT_LEN..12 + SALT_LEN + NONCE_LEN]);

        let ciphertext = bytes[12 + SALT_LEN + NONCE_LEN..].to_vec();
        Ok(Self {
            params,
            salt,
            sealed: Sealed { nonce, ciphertext },
        })
    }
}

/// Encrypt with a password: generate salt, derive key, seal, zero the key.
pub fn encrypt_with_password(
    plaintext: &[u8],
    password: &str,
    params: &KdfParams,
) -> Result<EncryptedBlob, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;

    let key = derive_key(password, &salt, params)?;
    let sealed = seal(plaintext, &key)?;

    Ok(EncryptedBlob {
        params: *params,
        salt,
        sealed,
    })
}

/// Decrypt a password-encrypted blob using the parameters it carries.
pub fn decrypt_with_password(
    blob: &EncryptedBlob,
    password: &str,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let key = derive_key(password, &blob.salt, &blob.params)?;
    open(&blob.sealed, &key)
}

/// Stored verifier for password validation without exposing the
/// encryption key: `hash = SHA-256(Argon2id(password, salt))`.
///
/// Wire format (big-endian):
/// `[m_cost u32][t_cost u32][p_cost u32][salt 16][hash 32]`
#[derive(Debug, Clone)]
pub struct PasswordVerifier {
    pub params: KdfParams,
    pub salt: [u8; SALT_LEN],
    pub hash: [u8; 32],
}

impl PasswordVerifier {
    /// Create a verifier for a password. Uses a salt independent of any
    /// encryption salt so the verifier never reveals the encryption key.
    pub fn create(password: &str, params: &KdfParams) -> Result<Self, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| CryptoError::Rng(e.to_string()))?;

        let key = derive_key(password, &salt, params)?;
        let hash: [u8; 32] = Sha256::digest(&key[..]).into();
        Ok(Self {
            params: *params,
            salt,
            hash,
        })
    }

    /// Constant-time password check.
    pub fn verify(&self, password: &str) -> Result<bool, CryptoError> {
        let key = derive_key(password, &self.salt, &self.params)?;
        let hash: [u8; 32] = Sha256::digest(&key[..]).into();
        Ok(hash.ct_eq(&self.hash).into())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(12 + SALT_LEN + 32);
        self.params.write_to(&mut bytes);
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.hash);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 12 + SALT_LEN + 32 {
            return Err(CryptoError::InvalidFormat);
        }
        let params = KdfParams::read_from(bytes)?;
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[12..12 + SALT_LEN]);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[12 + SALT_LEN..]);
        Ok(Self { params, salt, hash })
    }
}
