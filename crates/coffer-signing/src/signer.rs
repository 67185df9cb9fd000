//! The signing engine
//!
//! Borrows an unlocked master key, derives the requested account key,
//! signs, and erases the derived secret before returning. All
//! signatures are recoverable ECDSA over secp256k1 in 64-byte compact
//! form plus a recovery id.

use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::Network;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature as EcdsaSignature};
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use coffer_core::chain::{address_for, ChainType};
use coffer_core::hdkey;

use crate::account::AccountRequest;
use crate::message::{bitcoin_message_digest, ethereum_message_digest};
use crate::utxo::{select_largest_first, utxo_signing_digest, Selection, UtxoRequest};
use crate::SigningError;

/// A compact recoverable signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// r || s, 64 bytes.
    pub compact: [u8; 64],
    /// Raw recovery id, 0–3.
    pub recovery_id: u8,
}

/// A transaction to sign, one variant per chain model.
#[derive(Debug, Clone)]
pub enum TransactionRequest {
    Utxo(UtxoRequest),
    Account(AccountRequest),
}

/// The signatures produced for a transaction request.
#[derive(Debug, Clone)]
pub enum SignedTransaction {
    Utxo {
        /// One (digest, signature) pair per selected input, in input order.
        input_signatures: Vec<([u8; 32], Signature)>,
        selection: Selection,
    },
    Account {
        digest: [u8; 32],
        signature: Signature,
        /// EIP-155 recovery value.
        v: u64,
    },
}

/// A signed message with the digest it covers.
#[derive(Debug, Clone, Copy)]
pub struct SignedMessage {
    pub digest: [u8; 32],
    pub signature: Signature,
}

/// Signing engine over a borrowed master key.
pub struct Signer<'a> {
    secp: Secp256k1<All>,
    master: &'a Xpriv,
    network: Network,
}

impl<'a> Signer<'a> {
    pub fn new(master: &'a Xpriv, network: Network) -> Self {
        Self {
            secp: Secp256k1::new(),
            master,
            network,
        }
    }

    /// Display address for an account path.
    pub fn address(&self, chain: ChainType, path: &DerivationPath) -> Result<String, SigningError> {
        let child = hdkey::derive_path(&self.secp, self.master, path)?;
        Ok(address_for(&self.secp, &child, chain, self.network))
    }

    /// Public key for an account path.
    pub fn public_key(&self, path: &DerivationPath) -> Result<PublicKey, SigningError> {
        let child = hdkey::derive_path(&self.secp, self.master, path)?;
        Ok(child.private_key.public_key(&self.secp))
    }

    /// Sign a transaction request for a chain and account path.
    ///
    /// The request variant must match the chain's model; a UTXO request
    /// against an account-model chain (or vice versa) is rejected.
    pub fn sign_transaction(
        &self,
        chain: ChainType,
        path: &DerivationPath,
        request: &TransactionRequest,
    ) -> Result<SignedTransaction, SigningError> {
        match (chain, request) {
            (ChainType::Bitcoin, TransactionRequest::Utxo(req)) => self.sign_utxo(path, req),
            (ChainType::Ethereum, TransactionRequest::Account(req)) => {
                self.sign_account(path, req)
            }
            (chain, _) => Err(SigningError::UnsupportedChain(format!(
                "request model does not match chain {chain}"
            ))),
        }
    }

    fn sign_utxo(
        &self,
        path: &DerivationPath,
        request: &UtxoRequest,
    ) -> Result<SignedTransaction, SigningError> {
        if request.recipient.is_empty() {
            return Err(SigningError::EmptyTransaction);
        }
        let selection = select_largest_first(&request.utxos, request.amount, request.fee)?;

        let input_signatures = self.with_account_key(path, |secp, sk| {
            (0..selection.inputs.len())
                .map(|i| {
                    let digest = utxo_signing_digest(&selection, request, i);
                    (digest, sign_digest(secp, sk, &digest))
                })
                .collect()
        })?;

        Ok(SignedTransaction::Utxo {
            input_signatures,
            selection,
        })
    }

    fn sign_account(
        &self,
        path: &DerivationPath,
        request: &AccountRequest,
    ) -> Result<SignedTransaction, SigningError> {
        let digest = request.signing_digest();
        let signature =
            self.with_account_key(path, |secp, sk| sign_digest(secp, sk, &digest))?;
        Ok(SignedTransaction::Account {
            digest,
            signature,
            v: request.v(signature.recovery_id),
        })
    }

    /// Sign a message using the chain's prefixing convention.
    pub fn sign_message(
        &self,
        chain: ChainType,
        path: &DerivationPath,
        message: &[u8],
    ) -> Result<SignedMessage, SigningError> {
        let digest = match chain {
            ChainType::Bitcoin => bitcoin_message_digest(message),
            ChainType::Ethereum => ethereum_message_digest(message),
        };
        let signature = self.with_account_key(path, |secp, sk| sign_digest(secp, sk, &digest))?;
        Ok(SignedMessage { digest, signature })
    }

    /// Derive the account key, run `f`, erase the derived secret.
    fn with_account_key<T>(
        &self,
        path: &DerivationPath,
        f: impl FnOnce(&Secp256k1<All>, &SecretKey) -> T,
    ) -> Result<T, SigningError> {
        let child = hdkey::derive_path(&self.secp, self.master, path)?;
        let secret_bytes = Zeroizing::new(child.private_key.secret_bytes());
        let mut sk = SecretKey::from_slice(secret_bytes.as_ref())
            .map_err(|e| SigningError::Signature(e.to_string()))?;
        let out = f(&self.secp, &sk);
        sk.non_secure_erase();
        Ok(out)
    }
}

fn sign_digest(secp: &Secp256k1<All>, sk: &SecretKey, digest: &[u8; 32]) -> Signature {
    let msg = Message::from_digest(*digest);
    let recoverable = secp.sign_ecdsa_recoverable(&msg, sk);
    let (recovery_id, compact) = recoverable.serialize_compact();
    Signature {
        compact,
        recovery_id: recovery_id.to_i32() as u8,
    }
}

/// Verify a signature over a 32-byte digest. Pure; no secret material.
pub fn verify_signature(digest: &[u8; 32], signature: &Signature, pubkey: &PublicKey) -> bool {
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(*digest);
    let Ok(sig) = EcdsaSignature::from_compact(&signature.compact) else {
        return false;
    };
    secp.verify_ecdsa(&msg, &sig, pubkey).is_ok()
}

/// Recover the signing public key from a recoverable signature.
pub fn recover_pubkey(
    digest: &[u8; 32],
    signature: &Signature,
) -> Result<PublicKey, SigningError> {
    let secp = Secp256k1::new();
    let msg = Message::from_digest(*digest);
    let recovery_id = RecoveryId::from_i32(i32::from(signature.recovery_id))
        .map_err(|e| SigningError::Signature(e.to_string()))?;
    let sig = RecoverableSignature::from_compact(&signature.compact, recovery_id)
        .map_err(|e| SigningError::Signature(e.to_string()))?;
    secp.recover_ecdsa(&msg, &sig)
        .map_err(|e| SigningError::Signature(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_core::chain::ethereum_address;
    use coffer_core::hdkey::{account_path, master_from_seed};
    use coffer_core::mnemonic::{derive_seed, from_entropy};

    fn test_master() -> Xpriv {
        let mnemonic = from_entropy(&[0u8; 16]).unwrap();
        let seed = derive_seed(&mnemonic, "");
        master_from_seed(&seed[..]).unwrap()
    }

    fn utxo(id: u8, value: u64) -> crate::Utxo {
        crate::Utxo {
            txid: [id; 32],
            vout: 0,
            value,
        }
    }

    /// The abandon-about seed at m/44'/60'/0'/0/0 must produce the
    /// publicly known Ethereum address. Any curve substitution fails
    /// this test.
    #[test]
    fn test_known_ethereum_address() {
        let master = test_master();
        let signer = Signer::new(&master, Network::Bitcoin);
        let path = account_path(ChainType::Ethereum, 0, 0, 0).unwrap();
        assert_eq!(
            signer.address(ChainType::Ethereum, &path).unwrap(),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
    }

    /// BIP-84 reference vector: first receive address for the
    /// abandon-about mnemonic.
    #[test]
    fn test_known_bitcoin_address() {
        let master = test_master();
        let signer = Signer::new(&master, Network::Bitcoin);
        let path = account_path(ChainType::Bitcoin, 0, 0, 0).unwrap();
        assert_eq!(
            signer.address(ChainType::Bitcoin, &path).unwrap(),
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"
        );
    }

    #[test]
    fn test_message_sign_verify_roundtrip() {
        let master = test_master();
        let signer = Signer::new(&master, Network::Bitcoin);
        let path = account_path(ChainType::Ethereum, 0, 0, 0).unwrap();

        let signed = signer
            .sign_message(ChainType::Ethereum, &path, b"hello coffer")
            .unwrap();
        let pubkey = signer.public_key(&path).unwrap();

        assert!(verify_signature(&signed.digest, &signed.signature, &pubkey));

        let mut tampered = signed.signature;
        tampered.compact[10] ^= 0x01;
        assert!(!verify_signature(&signed.digest, &tampered, &pubkey));
    }

    #[test]
    fn test_recovered_key_matches_address() {
        let master = test_master();
        let signer = Signer::new(&master, Network::Bitcoin);
        let path = account_path(ChainType::Ethereum, 0, 0, 0).unwrap();

        let signed = signer
            .sign_message(ChainType::Ethereum, &path, b"prove ownership")
            .unwrap();
        let recovered = recover_pubkey(&signed.digest, &signed.signature).unwrap();
        assert_eq!(
            ethereum_address(&recovered),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
    }

    #[test]
    fn test_account_transaction_signing() {
        let master = test_master();
        let signer = Signer::new(&master, Network::Bitcoin);
        let path = account_path(ChainType::Ethereum, 0, 0, 0).unwrap();

        let request = TransactionRequest::Account(AccountRequest {
            nonce: 0,
            gas_price: 1_000_000_000,
            gas_limit: 21_000,
            to: "0x9858EfFD232B4033E47d90003D41EC34EcaEda94".into(),
            value: 1,
            data: vec![],
            chain_id: 1,
        });

        let signed = signer
            .sign_transaction(ChainType::Ethereum, &path, &request)
            .unwrap();
        let SignedTransaction::Account { digest, signature, v } = signed else {
            panic!("expected account result");
        };
        assert!(v == 37 || v == 38);
        let pubkey = signer.public_key(&path).unwrap();
        assert!(verify_signature(&digest, &signature, &pubkey));
    }

    #[test]
    fn test_utxo_transaction_signing() {
        let master = test_master();
        let signer = Signer::new(&master, Network::Bitcoin);
        let path = account_path(ChainType::Bitcoin, 0, 0, 0).unwrap();

        let request = TransactionRequest::Utxo(UtxoRequest {
            utxos: vec![utxo(1, 30_000), utxo(2, 40_000)],
            recipient: "bc1qrecipient".into(),
            change_address: "bc1qchange".into(),
            amount: 50_000,
            fee: 1_000,
        });

        let signed = signer
            .sign_transaction(ChainType::Bitcoin, &path, &request)
            .unwrap();
        let SignedTransaction::Utxo {
            input_signatures,
            selection,
        } = signed
        else {
            panic!("expected utxo result");
        };
        assert_eq!(selection.inputs.len(), 2);
        assert_eq!(input_signatures.len(), 2);

        let pubkey = signer.public_key(&path).unwrap();
        for (digest, signature) in &input_signatures {
            assert!(verify_signature(digest, signature, &pubkey));
        }
    }

    #[test]
    fn test_insufficient_funds_propagates() {
        let master = test_master();
        let signer = Signer::new(&master, Network::Bitcoin);
        let path = account_path(ChainType::Bitcoin, 0, 0, 0).unwrap();

        let request = TransactionRequest::Utxo(UtxoRequest {
            utxos: vec![utxo(1, 100)],
            recipient: "bc1qrecipient".into(),
            change_address: "bc1qchange".into(),
            amount: 1_000,
            fee: 100,
        });
        assert!(matches!(
            signer.sign_transaction(ChainType::Bitcoin, &path, &request),
            Err(SigningError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_chain_request_mismatch_rejected() {
        let master = test_master();
        let signer = Signer::new(&master, Network::Bitcoin);
        let path = account_path(ChainType::Bitcoin, 0, 0, 0).unwrap();

        let request = TransactionRequest::Account(AccountRequest {
            nonce: 0,
            gas_price: 0,
            gas_limit: 0,
            to: String::new(),
            value: 0,
            data: vec![],
            chain_id: 1,
        });
        assert!(matches!(
            signer.sign_transaction(ChainType::Bitcoin, &path, &request),
            Err(SigningError::UnsupportedChain(_))
        ));
    }

    #[test]
    fn test_signing_is_deterministic_per_rfc6979() {
        let master = test_master();
        let signer = Signer::new(&master, Network::Bitcoin);
        let path = account_path(ChainType::Ethereum, 0, 0, 0).unwrap();

        let a = signer
            .sign_message(ChainType::Ethereum, &path, b"same message")
            .unwrap();
        let b = signer
            .sign_message(ChainType::Ethereum, &path, b"same message")
            .unwrap();
        assert_eq!(a.signature, b.signature);
    }
}
