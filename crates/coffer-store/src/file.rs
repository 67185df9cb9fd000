//! File-per-key store
//!
//! Persists each key as its own file under an application directory.
//! Values written here are always ciphertext or non-secret metadata, so
//! the filesystem is a valid backing for platforms without a keychain.
//! Key names are restricted to `[A-Za-z0-9._-]` to keep them safe as
//! file names.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{SecureStore, StoreError};

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(StoreError::Storage(format!("invalid store key: {key:?}")));
        }
        Ok(self.dir.join(key))
    }
}

impl SecureStore for FileStore {
    fn save(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        // Write to a temp file then rename, so a crash never leaves a
        // half-written record. The suffix is appended, not substituted,
        // so dotted keys keep distinct temp names.
        let tmp = self.dir.join(format!("{key}.tmp"));
        fs::write(&tmp, value).map_err(|e| StoreError::Storage(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(StoreError::AccessDenied),
            Err(e) => Err(StoreError::Storage(e.to_string())),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Storage(e.to_string())),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(key)?.is_file())
    }
}
