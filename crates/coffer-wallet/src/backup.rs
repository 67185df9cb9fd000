//! Encrypted backup container
//!
//! Versioned, magic-tagged, big-endian binary format:
//!
//! ```text
//! magic "CFBK" | version u16 | timestamp u64 | metadata (u32 len + JSON)
//! | salt [32] | checksum [32] | nonce [12] | ciphertext (u32 len, incl. tag)
//! ```
//!
//! The checksum is SHA-256 of the **plaintext** payload, verified after
//! decryption: AEAD failure means wrong password or tampering (the two
//! are not distinguished); a checksum mismatch after successful
//! decryption means corruption of the plaintext encoding itself.
//! KDF cost parameters ride in the metadata JSON so old backups stay
//! restorable after the defaults are raised.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use coffer_core::crypto::{self, KdfParams, Sealed, NONCE_LEN, TAG_LEN};
use coffer_store::Account;

use crate::manager::WalletSettings;
use crate::WalletError;

pub const BACKUP_MAGIC: [u8; 4] = *b"CFBK";
pub const BACKUP_VERSION: u16 = 1;

const BACKUP_SALT_LEN: usize = 32;
/// Parsing cap for the metadata and ciphertext length prefixes.
const MAX_FIELD_LEN: u32 = 1 << 20;

/// Non-secret container metadata, serialized as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub created_by: String,
    pub kdf_m_cost: u32,
    pub kdf_t_cost: u32,
    pub kdf_p_cost: u32,
}

impl BackupMetadata {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            m_cost: self.kdf_m_cost,
            t_cost: self.kdf_t_cost,
            p_cost: self.kdf_p_cost,
        }
    }
}

/// The secret payload: everything needed to reconstruct the wallet.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupPayload {
    pub mnemonic: String,
    pub accounts: Vec<Account>,
    pub settings: WalletSettings,
}

impl Drop for BackupPayload {
    fn drop(&mut self) {
        self.mnemonic.zeroize();
    }
}

/// A parsed backup container.
#[derive(Debug, Clone)]
pub struct BackupContainer {
    pub version: u16,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub metadata: BackupMetadata,
    pub salt: [u8; BACKUP_SALT_LEN],
    /// SHA-256 of the plaintext payload.
    pub checksum: [u8; 32],
    pub sealed: Sealed,
}

impl BackupContainer {
    pub fn to_bytes(&self) -> Result<Vec<u8>, WalletError> {
        let metadata =
            serde_json::to_vec(&self.metadata).map_err(|_| WalletError::BackupIntegrityFailure)?;

        let mut bytes = Vec::with_capacity(
            4 + 2 + 8 + 4 + metadata.len() + BACKUP_SALT_LEN + 32 + NONCE_LEN + 4
                + self.sealed.ciphertext.len(),
        );
        bytes.extend_from_slice(&BACKUP_MAGIC);
        bytes.extend_from_slice(&self.version.to_be_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        bytes.extend_from_slice(&(metadata.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&metadata);
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.checksum);
        bytes.extend_from_slice(&self.sealed.nonce);
        bytes.extend_from_slice(&(self.sealed.ciphertext.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.sealed.ciphertext);
        Ok(bytes)
    }

    /// Parse a container. Magic and version are checked before anything
    /// else; unknown or future versions are rejected explicitly rather
    /// than best-effort parsed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let mut cursor = Cursor::new(bytes);

        let magic = cursor.take(4)?;
        if magic != BACKUP_MAGIC {
            return Err(WalletError::BackupIntegrityFailure);
        }

        let version = u16::from_be_bytes(cursor.take_array()?);
        if version != BACKUP_VERSION {
            return Err(WalletError::IncompatibleBackupVersion(version));
        }

        let timestamp = u64::from_be_bytes(cursor.take_array()?);

        let metadata_len = cursor.take_u32_len()?;
        let metadata: BackupMetadata = serde_json::from_slice(cursor.take(metadata_len)?)
            .map_err(|_| WalletError::BackupIntegrityFailure)?;

        let salt: [u8; BACKUP_SALT_LEN] = cursor.take_array()?;
        let checksum: [u8; 32] = cursor.take_array()?;
        let nonce: [u8; NONCE_LEN] = cursor.take_array()?;

        let ciphertext_len = cursor.take_u32_len()?;
        if ciphertext_len < TAG_LEN {
            return Err(WalletError::BackupIntegrityFailure);
        }
        let ciphertext = cursor.take(ciphertext_len)?.to_vec();

        if !cursor.at_end() {
            return Err(WalletError::BackupIntegrityFailure);
        }

        Ok(Self {
            version,
            timestamp,
            metadata,
            salt,
            checksum,
            sealed: Sealed { nonce, ciphertext },
        })
    }
}

/// Encrypt a payload into a container. All intermediate plaintext and
/// the derived key are zeroed before returning.
pub fn seal_backup(
    payload: &BackupPayload,
    password: &str,
    kdf: &KdfParams,
    timestamp: u64,
) -> Result<BackupContainer, WalletError> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(payload).map_err(|_| WalletError::BackupIntegrityFailure)?,
    );
    let checksum: [u8; 32] = Sha256::digest(&plaintext[..]).into();

    let mut salt = [0u8; BACKUP_SALT_LEN];
    use rand::RngCore;
    rand::rngs::OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| WalletError::Crypto(coffer_core::CryptoError::Rng(e.to_string())))?;

    let key = crypto::derive_key(password, &salt, kdf)?;
    let sealed = crypto::seal(&plaintext, &key)?;

    Ok(BackupContainer {
        version: BACKUP_VERSION,
        timestamp,
        metadata: BackupMetadata {
            created_by: "coffer".into(),
            kdf_m_cost: kdf.m_cost,
            kdf_t_cost: kdf.t_cost,
            kdf_p_cost: kdf.p_cost,
        },
        salt,
        checksum,
        sealed,
    })
}

/// Decrypt and integrity-check a container, returning the payload.
pub fn open_backup(
    container: &BackupContainer,
    password: &str,
) -> Result<BackupPayload, WalletError> {
    let key = crypto::derive_key(password, &container.salt, &container.metadata.kdf_params())?;
    let plaintext = crypto::open(&container.sealed, &key)?;

    let checksum: [u8; 32] = Sha256::digest(&plaintext[..]).into();
    if !bool::from(checksum.ct_eq(&container.checksum)) {
        return Err(WalletError::BackupIntegrityFailure);
    }

    serde_json::from_slice(&plaintext).map_err(|_| WalletError::BackupIntegrityFailure)
}

/// Structural pre-validation for UI: magic + parseable container, no
/// password required.
pub fn validate_backup(bytes: &[u8]) -> bool {
    BackupContainer::from_bytes(bytes).is_ok()
}

/// Bounds-checked reader over the container bytes.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], WalletError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&e| e <= self.bytes.len())
            .ok_or(WalletError::BackupIntegrityFailure)?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], WalletError> {
        self.take(N)?
            .try_into()
            .map_err(|_| WalletError::BackupIntegrityFailure)
    }

    fn take_u32_len(&mut self) -> Result<usize, WalletError> {
        let len = u32::from_be_bytes(self.take_array()?);
        if len > MAX_FIELD_LEN {
            return Err(WalletError::BackupIntegrityFailure);
        }
        Ok(len as usize)
    }

    fn at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_core::ChainType;

    fn kdf() -> KdfParams {
        KdfParams::fast_insecure()
    }

    fn payload() -> BackupPayload {
        BackupPayload {
            mnemonic:
                "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
                    .into(),
            accounts: vec![Account {
                index: 0,
                chain: ChainType::Ethereum,
                derivation_path: "m/44'/60'/0'/0/0".into(),
                address: "0x9858EfFD232B4033E47d90003D41EC34EcaEda94".into(),
                display_name: "Account 0".into(),
            }],
            settings: WalletSettings::default(),
        }
    }

    #[test]
    fn test_backup_roundtrip() {
        let container = seal_backup(&payload(), "pass word 1", &kdf(), 1_700_000_000).unwrap();
        let bytes = container.to_bytes().unwrap();

        let parsed = BackupContainer::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.version, BACKUP_VERSION);
        assert_eq!(parsed.timestamp, 1_700_000_000);

        let restored = open_backup(&parsed, "pass word 1").unwrap();
        assert_eq!(restored.mnemonic, payload().mnemonic);
        assert_eq!(restored.accounts, payload().accounts);
    }

    #[test]
    fn test_wrong_password_is_decryption_error_not_checksum() {
        let container = seal_backup(&payload(), "right", &kdf(), 0).unwrap();
        let err = open_backup(&container, "wrong").unwrap_err();
        assert!(
            matches!(
                err,
                WalletError::Crypto(coffer_core::CryptoError::AuthenticationFailed)
            ),
            "wrong password must fail at the AEAD layer, got {err}"
        );
    }

    #[test]
    fn test_bad_magic_rejected() {
        let container = seal_backup(&payload(), "pw", &kdf(), 0).unwrap();
        let mut bytes = container.to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            BackupContainer::from_bytes(&bytes),
            Err(WalletError::BackupIntegrityFailure)
        ));
        assert!(!validate_backup(&bytes));
    }

    #[test]
    fn test_future_version_rejected_explicitly() {
        let container = seal_backup(&payload(), "pw", &kdf(), 0).unwrap();
        let mut bytes = container.to_bytes().unwrap();
        // version field sits right after the 4-byte magic
        bytes[4] = 0x00;
        bytes[5] = 0x63;
        assert!(matches!(
            BackupContainer::from_bytes(&bytes),
            Err(WalletError::IncompatibleBackupVersion(99))
        ));
    }

    #[test]
    fn test_truncated_container_rejected() {
        let container = seal_backup(&payload(), "pw", &kdf(), 0).unwrap();
        let bytes = container.to_bytes().unwrap();
        for len in 0..bytes.len() {
            assert!(
                BackupContainer::from_bytes(&bytes[..len]).is_err(),
                "truncation to {len} bytes must be rejected"
            );
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let container = seal_backup(&payload(), "pw", &kdf(), 0).unwrap();
        let mut bytes = container.to_bytes().unwrap();
        bytes.push(0x00);
        assert!(BackupContainer::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_validate_backup_structural_only() {
        let container = seal_backup(&payload(), "pw", &kdf(), 0).unwrap();
        let bytes = container.to_bytes().unwrap();
        // Valid structure regardless of password knowledge
        assert!(validate_backup(&bytes));
        assert!(!validate_backup(b"not a backup"));
        assert!(!validate_backup(&[]));
    }

    #[test]
    fn test_corrupted_ciphertext_fails_closed() {
        let container = seal_backup(&payload(), "pw", &kdf(), 0).unwrap();
        let mut bytes = container.to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let parsed = BackupContainer::from_bytes(&bytes).unwrap();
        assert!(open_backup(&parsed, "pw").is_err());
    }

    #[test]
    fn test_kdf_params_honored_from_metadata() {
        let custom = KdfParams {
            m_cost: 128,
            t_cost: 2,
            p_cost: 1,
        };
        let container = seal_backup(&payload(), "pw", &custom, 0).unwrap();
        let parsed = BackupContainer::from_bytes(&container.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.metadata.kdf_params(), custom);
        assert!(open_backup(&parsed, "pw").is_ok());
    }
}
