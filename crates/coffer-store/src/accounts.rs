//! Account metadata records
//!
//! Ordered list of derived accounts persisted as JSON through the
//! secure store. Metadata only — never key material. Addresses stored
//! here are display hints; security-sensitive callers re-derive them
//! from the key tree.

use coffer_core::ChainType;
use serde::{Deserialize, Serialize};

use crate::{SecureStore, StoreError};

/// Store key under which the account list is persisted.
pub const ACCOUNTS_KEY: &str = "wallet.accounts";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Account index within the chain's derivation tree.
    pub index: u32,
    pub chain: ChainType,
    /// Full derivation path, e.g. "m/44'/60'/0'/0/0".
    pub derivation_path: String,
    /// Display address recomputed from the tree at creation time.
    pub address: String,
    pub display_name: String,
}

/// Persistence helper for the account list.
pub struct AccountStore<'a, S: SecureStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SecureStore + ?Sized> AccountStore<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Load the account list; an absent record is an empty list.
    pub fn list(&self) -> Result<Vec<Account>, StoreError> {
        match self.store.load(ACCOUNTS_KEY) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::InvalidRecord(e.to_string())),
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Replace the persisted account list.
    pub fn save(&self, accounts: &[Account]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(accounts)
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        self.store.save(ACCOUNTS_KEY, &bytes)
    }

    /// Append one account, rejecting duplicate (chain, index) pairs.
    pub fn append(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.list()?;
        if accounts
            .iter()
            .any(|a| a.chain == account.chain && a.index == account.index)
        {
            return Err(StoreError::InvalidRecord(format!(
                "account {} already exists for chain {}",
                account.index, account.chain
            )));
        }
        accounts.push(account);
        self.save(&accounts)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.delete(ACCOUNTS_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn account(chain: ChainType, index: u32) -> Account {
        Account {
            index,
            chain,
            derivation_path: format!("m/44'/60'/{index}'/0/0"),
            address: format!("0xaddr{index}"),
            display_name: format!("Account {index}"),
        }
    }

    #[test]
    fn test_empty_store_is_empty_list() {
        let store = MemoryStore::new();
        let accounts = AccountStore::new(&store);
        assert!(accounts.list().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_list_preserves_order() {
        let store = MemoryStore::new();
        let accounts = AccountStore::new(&store);
        accounts.append(account(ChainType::Ethereum, 0)).unwrap();
        accounts.append(account(ChainType::Ethereum, 1)).unwrap();
        accounts.append(account(ChainType::Bitcoin, 0)).unwrap();

        let list = accounts.list().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].index, 0);
        assert_eq!(list[1].index, 1);
        assert_eq!(list[2].chain, ChainType::Bitcoin);
    }

    #[test]
    fn test_duplicate_rejected() {
        let store = MemoryStore::new();
        let accounts = AccountStore::new(&store);
        accounts.append(account(ChainType::Ethereum, 0)).unwrap();
        assert!(accounts.append(account(ChainType::Ethereum, 0)).is_err());
        // Same index on a different chain is fine
        accounts.append(account(ChainType::Bitcoin, 0)).unwrap();
    }

    #[test]
    fn test_clear() {
        let store = MemoryStore::new();
        let accounts = AccountStore::new(&store);
        accounts.append(account(ChainType::Ethereum, 0)).unwrap();
        accounts.clear().unwrap();
        assert!(accounts.list().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_record_surfaced() {
        let store = MemoryStore::new();
        store.save(ACCOUNTS_KEY, b"not json").unwrap();
        let accounts = AccountStore::new(&store);
        assert!(matches!(
            accounts.list(),
            Err(StoreError::InvalidRecord(_))
        ));
    }
}
