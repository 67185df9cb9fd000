//! Wallet lifecycle manager
//!
//! Owns the state machine (uninitialized / locked / unlocked), the
//! failed-attempt lockout window, and the inactivity auto-lock. The
//! decrypted seed lives only inside the `Unlocked` variant, held in an
//! mlocked [`SecretBuffer`], and every transition out of `Unlocked`
//! scrubs it.
//!
//! Persistence goes exclusively through the injected [`SecureStore`]:
//! the mnemonic ciphertext, the password verifier, account metadata,
//! and settings. Nothing here writes plaintext key material anywhere.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bitcoin::Network;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use coffer_core::crypto::{
    decrypt_with_password, encrypt_with_password, EncryptedBlob, KdfParams, PasswordVerifier,
};
use coffer_core::hdkey::{account_path, master_from_seed};
use coffer_core::memory::{disable_core_dumps, SecretBuffer};
use coffer_core::mnemonic::{
    derive_seed, generate_mnemonic, parse_mnemonic, MnemonicError, Strength,
};
use coffer_core::password::PasswordPolicy;
use coffer_core::ChainType;
use coffer_signing::{SignedMessage, SignedTransaction, Signer, TransactionRequest};
use coffer_store::{Account, AccountStore, DeviceAuthGate, NoAuthGate, SecureStore, StoreError};

use crate::backup::{open_backup, seal_backup, BackupContainer, BackupPayload};
use crate::WalletError;

const MNEMONIC_KEY: &str = "wallet.mnemonic";
const VERIFIER_KEY: &str = "wallet.verifier";
const SETTINGS_KEY: &str = "wallet.settings";

/// Externally observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletState {
    Uninitialized,
    Locked,
    /// Locked with an active failed-attempt lockout window.
    LockedOut,
    Unlocked,
}

/// The currently selected account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveAccount {
    pub chain: ChainType,
    pub index: u32,
}

/// Non-secret user settings, persisted as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletSettings {
    pub active_account: Option<ActiveAccount>,
}

/// Tunables for one manager instance.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub network: Network,
    /// Failed unlock attempts before a lockout window starts.
    pub max_attempts: u32,
    pub lockout_duration: Duration,
    /// Inactivity period after which the wallet locks itself.
    pub auto_lock_after: Duration,
    pub kdf: KdfParams,
    pub policy: PasswordPolicy,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            max_attempts: 5,
            lockout_duration: Duration::from_secs(300),
            auto_lock_after: Duration::from_secs(300),
            kdf: KdfParams::default(),
            policy: PasswordPolicy::default(),
        }
    }
}

/// Decrypted key material; exists only while unlocked.
struct Unlocked {
    /// BIP-39 seed, mlocked and zeroized on drop.
    #[allow(dead_code)]
    seed: SecretBuffer,
    master: bitcoin::bip32::Xpriv,
}

impl Unlocked {
    fn from_seed(seed: &[u8]) -> Result<Self, WalletError> {
        let master = master_from_seed(seed)?;
        Ok(Self {
            seed: SecretBuffer::from_slice(seed),
            master,
        })
    }
}

enum Lifecycle {
    Uninitialized,
    Locked,
    Unlocked(Unlocked),
}

struct Inner {
    lifecycle: Lifecycle,
    failed_attempts: u32,
    lockout_until: Option<Instant>,
    last_activity: Instant,
}

/// The wallet lifecycle manager.
pub struct WalletManager<S: SecureStore> {
    store: S,
    gate: Box<dyn DeviceAuthGate>,
    config: WalletConfig,
    inner: Mutex<Inner>,
}

impl<S: SecureStore> WalletManager<S> {
    /// Open a manager over a store without a device-auth prompt.
    pub fn new(store: S, config: WalletConfig) -> Result<Self, WalletError> {
        Self::with_gate(store, Box::new(NoAuthGate), config)
    }

    /// Open a manager with a platform device-auth gate consulted on
    /// unlock and mnemonic reveal.
    pub fn with_gate(
        store: S,
        gate: Box<dyn DeviceAuthGate>,
        config: WalletConfig,
    ) -> Result<Self, WalletError> {
        disable_core_dumps();
        let lifecycle = if store.exists(MNEMONIC_KEY)? {
            Lifecycle::Locked
        } else {
            Lifecycle::Uninitialized
        };
        Ok(Self {
            store,
            gate,
            config,
            inner: Mutex::new(Inner {
                lifecycle,
                failed_attempts: 0,
                lockout_until: None,
                last_activity: Instant::now(),
            }),
        })
    }

    /// Current lifecycle state, after applying any pending auto-lock.
    pub fn state(&self) -> WalletState {
        let mut inner = self.guard();
        Self::maybe_auto_lock(&mut inner, &self.config);
        match &inner.lifecycle {
            Lifecycle::Uninitialized => WalletState::Uninitialized,
            Lifecycle::Unlocked(_) => WalletState::Unlocked,
            Lifecycle::Locked => match inner.lockout_until {
                Some(until) if Instant::now() < until => WalletState::LockedOut,
                _ => WalletState::Locked,
            },
        }
    }

    /// Create a brand-new wallet, returning the mnemonic phrase for the
    /// user to write down. Ends unlocked.
    pub fn create_wallet(
        &self,
        password: &str,
        strength: Strength,
    ) -> Result<Zeroizing<String>, WalletError> {
        let mut inner = self.guard();
        if !matches!(inner.lifecycle, Lifecycle::Uninitialized) {
            return Err(WalletError::WalletAlreadyExists);
        }
        self.config.policy.validate(password)?;

        let mnemonic = generate_mnemonic(strength)?;
        let phrase = Zeroizing::new(mnemonic.to_string());
        self.initialize(&mut inner, &phrase, password, &[], &WalletSettings::default())?;
        Ok(phrase)
    }

    /// Restore a wallet from an existing mnemonic phrase. Ends unlocked.
    pub fn import_wallet(&self, phrase: &str, password: &str) -> Result<(), WalletError> {
        let mut inner = self.guard();
        if !matches!(inner.lifecycle, Lifecycle::Uninitialized) {
            return Err(WalletError::WalletAlreadyExists);
        }
        self.config.policy.validate(password)?;

        // Normalize before persisting so unlock re-parses cleanly.
        let mnemonic = parse_mnemonic(phrase)?;
        let canonical = Zeroizing::new(mnemonic.to_string());
        self.initialize(&mut inner, &canonical, password, &[], &WalletSettings::default())
    }

    /// Restore a wallet from an encrypted backup container. Ends unlocked
    /// with the backed-up accounts and settings in place.
    pub fn restore_backup(&self, bytes: &[u8], password: &str) -> Result<(), WalletError> {
        let mut inner = self.guard();
        if !matches!(inner.lifecycle, Lifecycle::Uninitialized) {
            return Err(WalletError::WalletAlreadyExists);
        }

        // No policy check here: the password proves itself against the
        // AEAD, and a backup sealed before a policy tightening must stay
        // restorable.
        let container = BackupContainer::from_bytes(bytes)?;
        let payload = open_backup(&container, password)?;
        let mnemonic = parse_mnemonic(&payload.mnemonic)?;
        let canonical = Zeroizing::new(mnemonic.to_string());
        self.initialize(&mut inner, &canonical, password, &payload.accounts, &payload.settings)
    }

    /// Export an encrypted backup of the wallet. Requires the wallet
    /// password; any initialized wallet can be backed up, locked or not.
    pub fn create_backup(&self, password: &str) -> Result<Vec<u8>, WalletError> {
        let inner = self.guard();
        if matches!(inner.lifecycle, Lifecycle::Uninitialized) {
            return Err(WalletError::NotInitialized);
        }
        drop(inner);

        let phrase = self.decrypt_mnemonic(password)?;
        let payload = BackupPayload {
            mnemonic: phrase.to_string(),
            accounts: AccountStore::new(&self.store).list()?,
            settings: self.settings()?,
        };
        let container = seal_backup(&payload, password, &self.config.kdf, unix_now())?;
        container.to_bytes()
    }

    /// Unlock with the wallet password. Rejected without touching the
    /// KDF while a lockout window is active.
    pub fn unlock(&self, password: &str) -> Result<(), WalletError> {
        let mut inner = self.guard();
        match inner.lifecycle {
            Lifecycle::Uninitialized => return Err(WalletError::NotInitialized),
            Lifecycle::Unlocked(_) => {
                inner.last_activity = Instant::now();
                return Ok(());
            }
            Lifecycle::Locked => {}
        }
        Self::check_lockout(&mut inner)?;

        if !self.gate.authenticate("unlock wallet") {
            return Err(WalletError::DeviceAuthDenied);
        }

        let verifier = PasswordVerifier::from_bytes(&self.store.load(VERIFIER_KEY)?)?;
        if !verifier.verify(password)? {
            return Err(Self::register_failure(&mut inner, &self.config));
        }
        inner.failed_attempts = 0;
        inner.lockout_until = None;

        let phrase = self.decrypt_mnemonic(password)?;
        let mnemonic = parse_mnemonic(&phrase)?;
        let seed = derive_seed(&mnemonic, "");
        inner.lifecycle = Lifecycle::Unlocked(Unlocked::from_seed(&seed[..])?);
        inner.last_activity = Instant::now();
        Ok(())
    }

    /// Lock the wallet, scrubbing all decrypted key material. Idempotent.
    pub fn lock(&self) {
        let mut inner = self.guard();
        Self::lock_inner(&mut inner);
    }

    /// App moved to background: lock immediately.
    pub fn on_background(&self) {
        self.lock();
    }

    /// Record user activity, pushing back the auto-lock deadline.
    pub fn note_activity(&self) {
        let mut inner = self.guard();
        Self::maybe_auto_lock(&mut inner, &self.config);
        inner.last_activity = Instant::now();
    }

    /// Reveal the mnemonic phrase for manual backup. Requires the
    /// password and the device-auth gate.
    pub fn reveal_mnemonic(&self, password: &str) -> Result<Zeroizing<String>, WalletError> {
        let inner = self.guard();
        if matches!(inner.lifecycle, Lifecycle::Uninitialized) {
            return Err(WalletError::NotInitialized);
        }
        drop(inner);

        if !self.gate.authenticate("reveal recovery phrase") {
            return Err(WalletError::DeviceAuthDenied);
        }
        self.decrypt_mnemonic(password)
    }

    /// Re-encrypt the wallet under a new password.
    ///
    /// Holds the state guard across the whole read-modify-write so two
    /// concurrent changes cannot leave the mnemonic ciphertext and the
    /// verifier under different passwords.
    pub fn change_password(&self, old: &str, new: &str) -> Result<(), WalletError> {
        let inner = self.guard();
        if matches!(inner.lifecycle, Lifecycle::Uninitialized) {
            return Err(WalletError::NotInitialized);
        }
        self.config.policy.validate(new)?;

        let phrase = self.decrypt_mnemonic(old)?;

        let previous_blob = self.store.load(MNEMONIC_KEY)?;
        let blob = encrypt_with_password(phrase.as_bytes(), new, &self.config.kdf)?;
        self.store.save(MNEMONIC_KEY, &blob.to_bytes())?;

        let verifier = PasswordVerifier::create(new, &self.config.kdf)
            .map(|v| v.to_bytes())
            .map_err(WalletError::from);
        match verifier.and_then(|bytes| self.store.save(VERIFIER_KEY, &bytes).map_err(Into::into)) {
            Ok(()) => Ok(()),
            Err(e) => {
                // Keep ciphertext and verifier under the same password.
                self.store.save(MNEMONIC_KEY, &previous_blob)?;
                Err(e)
            }
        }
    }

    /// Destroy the wallet: every persisted record is deleted and all
    /// in-memory key material scrubbed. Requires the password.
    pub fn delete_wallet(&self, password: &str) -> Result<(), WalletError> {
        let mut inner = self.guard();
        if matches!(inner.lifecycle, Lifecycle::Uninitialized) {
            return Err(WalletError::NotInitialized);
        }

        let verifier = PasswordVerifier::from_bytes(&self.store.load(VERIFIER_KEY)?)?;
        if !verifier.verify(password)? {
            return Err(WalletError::AuthenticationFailed);
        }

        Self::lock_inner(&mut inner);
        for key in [MNEMONIC_KEY, VERIFIER_KEY, SETTINGS_KEY] {
            match self.store.delete(key) {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        AccountStore::new(&self.store).clear()?;
        inner.lifecycle = Lifecycle::Uninitialized;
        inner.failed_attempts = 0;
        inner.lockout_until = None;
        Ok(())
    }

    /// Derive and persist a new account. Requires unlock.
    pub fn create_account(
        &self,
        chain: ChainType,
        index: u32,
        display_name: &str,
    ) -> Result<Account, WalletError> {
        let mut inner = self.guard();
        Self::maybe_auto_lock(&mut inner, &self.config);
        let unlocked = Self::unlocked(&inner)?;

        let path = account_path(chain, index, 0, 0)?;
        let signer = Signer::new(&unlocked.master, self.config.network);
        let account = Account {
            index,
            chain,
            derivation_path: format!("m/{path}"),
            address: signer.address(chain, &path)?,
            display_name: display_name.to_owned(),
        };
        AccountStore::new(&self.store).append(account.clone())?;
        inner.last_activity = Instant::now();
        Ok(account)
    }

    /// All persisted accounts, in creation order.
    pub fn list_accounts(&self) -> Result<Vec<Account>, WalletError> {
        Ok(AccountStore::new(&self.store).list()?)
    }

    pub fn settings(&self) -> Result<WalletSettings, WalletError> {
        match self.store.load(SETTINGS_KEY) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::InvalidRecord(e.to_string()).into()),
            Err(StoreError::NotFound(_)) => Ok(WalletSettings::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Select the account subsequent UIs should display by default.
    pub fn set_active_account(&self, chain: ChainType, index: u32) -> Result<(), WalletError> {
        self.require_account(chain, index)?;
        let mut settings = self.settings()?;
        settings.active_account = Some(ActiveAccount { chain, index });
        self.save_settings(&settings)
    }

    /// Receive address for an account, re-derived from the key tree
    /// rather than read back from metadata. Requires unlock.
    pub fn get_address(&self, chain: ChainType, index: u32) -> Result<String, WalletError> {
        self.require_account(chain, index)?;
        let mut inner = self.guard();
        Self::maybe_auto_lock(&mut inner, &self.config);
        let unlocked = Self::unlocked(&inner)?;

        let path = account_path(chain, index, 0, 0)?;
        let address = Signer::new(&unlocked.master, self.config.network).address(chain, &path)?;
        inner.last_activity = Instant::now();
        Ok(address)
    }

    /// Sign a transaction with an account's key. Requires unlock.
    pub fn sign_transaction(
        &self,
        chain: ChainType,
        index: u32,
        request: &TransactionRequest,
    ) -> Result<SignedTransaction, WalletError> {
        self.require_account(chain, index)?;
        let mut inner = self.guard();
        Self::maybe_auto_lock(&mut inner, &self.config);
        let unlocked = Self::unlocked(&inner)?;

        let path = account_path(chain, index, 0, 0)?;
        let signed = Signer::new(&unlocked.master, self.config.network)
            .sign_transaction(chain, &path, request)?;
        inner.last_activity = Instant::now();
        Ok(signed)
    }

    /// Sign a message with an account's key using the chain's prefixing
    /// convention. Requires unlock.
    pub fn sign_message(
        &self,
        chain: ChainType,
        index: u32,
        message: &[u8],
    ) -> Result<SignedMessage, WalletError> {
        self.require_account(chain, index)?;
        let mut inner = self.guard();
        Self::maybe_auto_lock(&mut inner, &self.config);
        let unlocked = Self::unlocked(&inner)?;

        let path = account_path(chain, index, 0, 0)?;
        let signed = Signer::new(&unlocked.master, self.config.network)
            .sign_message(chain, &path, message)?;
        inner.last_activity = Instant::now();
        Ok(signed)
    }

    /// Verify a signature over a digest. Pure; works in any lifecycle
    /// state since no key material is needed.
    pub fn verify_signature(
        &self,
        digest: &[u8; 32],
        signature: &coffer_signing::Signature,
        pubkey: &bitcoin::secp256k1::PublicKey,
    ) -> bool {
        coffer_signing::verify_signature(digest, signature, pubkey)
    }

    // ---- internals ----

    fn guard(&self) -> MutexGuard<'_, Inner> {
        // A panic mid-transition leaves at worst a locked wallet; the
        // data itself cannot be torn.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unlocked<'a>(inner: &'a Inner) -> Result<&'a Unlocked, WalletError> {
        match &inner.lifecycle {
            Lifecycle::Unlocked(u) => Ok(u),
            Lifecycle::Locked => Err(WalletError::WalletLocked),
            Lifecycle::Uninitialized => Err(WalletError::NotInitialized),
        }
    }

    fn lock_inner(inner: &mut Inner) {
        if matches!(inner.lifecycle, Lifecycle::Unlocked(_)) {
            if let Lifecycle::Unlocked(mut unlocked) =
                std::mem::replace(&mut inner.lifecycle, Lifecycle::Locked)
            {
                unlocked.master.private_key.non_secure_erase();
            }
        }
    }

    fn maybe_auto_lock(inner: &mut Inner, config: &WalletConfig) {
        if matches!(inner.lifecycle, Lifecycle::Unlocked(_))
            && inner.last_activity.elapsed() >= config.auto_lock_after
        {
            Self::lock_inner(inner);
        }
    }

    fn check_lockout(inner: &mut Inner) -> Result<(), WalletError> {
        match inner.lockout_until {
            Some(until) => {
                let remaining = until.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    inner.lockout_until = None;
                    inner.failed_attempts = 0;
                    Ok(())
                } else {
                    let mut secs = remaining.as_secs();
                    if remaining.subsec_nanos() > 0 {
                        secs += 1;
                    }
                    Err(WalletError::AuthenticationAttemptsExceeded { retry_in_secs: secs })
                }
            }
            None => Ok(()),
        }
    }

    fn register_failure(inner: &mut Inner, config: &WalletConfig) -> WalletError {
        inner.failed_attempts += 1;
        if inner.failed_attempts >= config.max_attempts {
            inner.lockout_until = Some(Instant::now() + config.lockout_duration);
            WalletError::AuthenticationAttemptsExceeded {
                retry_in_secs: config.lockout_duration.as_secs().max(1),
            }
        } else {
            WalletError::AuthenticationFailed
        }
    }

    fn decrypt_mnemonic(&self, password: &str) -> Result<Zeroizing<String>, WalletError> {
        let blob = EncryptedBlob::from_bytes(&self.store.load(MNEMONIC_KEY)?)?;
        let plaintext = decrypt_with_password(&blob, password)?;
        let phrase = std::str::from_utf8(&plaintext)
            .map_err(|_| MnemonicError::Invalid("stored phrase is not valid UTF-8".into()))?;
        Ok(Zeroizing::new(phrase.to_owned()))
    }

    /// Persist a freshly created or restored wallet and move to
    /// `Unlocked`. The mnemonic record is rolled back if the verifier
    /// cannot be written, so the store never holds a wallet that cannot
    /// be unlocked.
    fn initialize(
        &self,
        inner: &mut Inner,
        phrase: &str,
        password: &str,
        accounts: &[Account],
        settings: &WalletSettings,
    ) -> Result<(), WalletError> {
        let blob = encrypt_with_password(phrase.as_bytes(), password, &self.config.kdf)?;
        self.store.save(MNEMONIC_KEY, &blob.to_bytes())?;

        let verifier_bytes = PasswordVerifier::create(password, &self.config.kdf)
            .map(|v| v.to_bytes())
            .map_err(WalletError::from);
        if let Err(e) =
            verifier_bytes.and_then(|bytes| self.store.save(VERIFIER_KEY, &bytes).map_err(Into::into))
        {
            let _ = self.store.delete(MNEMONIC_KEY);
            return Err(e);
        }

        let mnemonic = parse_mnemonic(phrase)?;
        let seed = derive_seed(&mnemonic, "");
        let unlocked = Unlocked::from_seed(&seed[..])?;

        let account_store = AccountStore::new(&self.store);
        if accounts.is_empty() {
            // Fresh wallets start with one account per supported chain.
            let signer = Signer::new(&unlocked.master, self.config.network);
            let mut defaults = Vec::new();
            for chain in [ChainType::Bitcoin, ChainType::Ethereum] {
                let path = account_path(chain, 0, 0, 0)?;
                defaults.push(Account {
                    index: 0,
                    chain,
                    derivation_path: format!("m/{path}"),
                    address: signer.address(chain, &path)?,
                    display_name: format!("{chain} 1"),
                });
            }
            account_store.save(&defaults)?;
            self.save_settings(&WalletSettings {
                active_account: Some(ActiveAccount {
                    chain: ChainType::Bitcoin,
                    index: 0,
                }),
            })?;
        } else {
            account_store.save(accounts)?;
            self.save_settings(settings)?;
        }

        inner.lifecycle = Lifecycle::Unlocked(unlocked);
        inner.failed_attempts = 0;
        inner.lockout_until = None;
        inner.last_activity = Instant::now();
        Ok(())
    }

    fn save_settings(&self, settings: &WalletSettings) -> Result<(), WalletError> {
        let bytes = serde_json::to_vec(settings)
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        Ok(self.store.save(SETTINGS_KEY, &bytes)?)
    }

    fn require_account(&self, chain: ChainType, index: u32) -> Result<Account, WalletError> {
        AccountStore::new(&self.store)
            .list()?
            .into_iter()
            .find(|a| a.chain == chain && a.index == index)
            .ok_or(WalletError::AccountNotFound { chain, index })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
