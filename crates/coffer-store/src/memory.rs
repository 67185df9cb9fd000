//! In-memory store — the test double for platform keystores.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{SecureStore, StoreError};

/// HashMap-backed [`SecureStore`]. Contents vanish with the process, so
/// this is only suitable for tests and ephemeral wallets. Clones share
/// the same underlying map, mirroring how separate handles to a platform
/// keystore see the same records.
#[derive(Default, Clone)]
pub struct MemoryStore {
    items: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStore for MemoryStore {
    fn save(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| StoreError::Storage("store mutex poisoned".into()))?;
        items.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let items = self
            .items
            .lock()
            .map_err(|_| StoreError::Storage("store mutex poisoned".into()))?;
        items
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| StoreError::Storage("store mutex poisoned".into()))?;
        items.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let items = self
            .items
            .lock()
            .map_err(|_| StoreError::Storage("store mutex poisoned".into()))?;
        Ok(items.contains_key(key))
    }
}
