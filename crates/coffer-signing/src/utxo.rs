//! UTXO-model transaction requests and coin selection
//!
//! Input selection is deterministic largest-first: sort candidates by
//! value descending and accumulate until amount + fee is covered.
//! Callers wanting fee-optimized selection can pre-select and pass an
//! exact UTXO set instead.

use serde::{Deserialize, Serialize};

use crate::message::double_sha256;
use crate::SigningError;

/// An unspent output available for spending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: [u8; 32],
    pub vout: u32,
    /// Value in satoshis.
    pub value: u64,
}

/// A UTXO-chain spend: pay `amount` to `recipient`, returning change to
/// `change_address`, from whatever subset of `utxos` covers it.
#[derive(Debug, Clone)]
pub struct UtxoRequest {
    pub utxos: Vec<Utxo>,
    pub recipient: String,
    pub change_address: String,
    /// Amount in satoshis.
    pub amount: u64,
    /// Flat fee in satoshis.
    pub fee: u64,
}

/// Outcome of coin selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub inputs: Vec<Utxo>,
    pub change: u64,
}

/// Largest-first selection. Fails with `InsufficientFunds` when the
/// whole set cannot cover amount + fee.
pub fn select_largest_first(
    utxos: &[Utxo],
    amount: u64,
    fee: u64,
) -> Result<Selection, SigningError> {
    let required = amount
        .checked_add(fee)
        .ok_or(SigningError::InsufficientFunds {
            available: utxos.iter().map(|u| u.value).sum(),
            required: u64::MAX,
        })?;

    let mut sorted: Vec<Utxo> = utxos.to_vec();
    sorted.sort_by(|a, b| b.value.cmp(&a.value).then(a.txid.cmp(&b.txid)));

    let mut inputs = Vec::new();
    let mut total = 0u64;
    for utxo in sorted {
        if total >= required {
            break;
        }
        total = total.saturating_add(utxo.value);
        inputs.push(utxo);
    }

    if total < required {
        return Err(SigningError::InsufficientFunds {
            available: total,
            required,
        });
    }

    Ok(Selection {
        inputs,
        change: total - required,
    })
}

/// Per-input signing digest over the selected prevout set and outputs.
///
/// Canonical serialization, double-SHA256 (the signing contract only;
/// full transaction encoding is assembled by the broadcasting layer):
/// all inputs `txid || vout`, all outputs `len(addr) || addr || value`,
/// then the index of the input being signed.
pub fn utxo_signing_digest(
    selection: &Selection,
    request: &UtxoRequest,
    input_index: usize,
) -> [u8; 32] {
    let mut preimage = Vec::new();
    preimage.extend_from_slice(&(selection.inputs.len() as u32).to_be_bytes());
    for input in &selection.inputs {
        preimage.extend_from_slice(&input.txid);
        preimage.extend_from_slice(&input.vout.to_be_bytes());
        preimage.extend_from_slice(&input.value.to_be_bytes());
    }

    let mut write_output = |address: &str, value: u64| {
        preimage.extend_from_slice(&(address.len() as u32).to_be_bytes());
        preimage.extend_from_slice(address.as_bytes());
        preimage.extend_from_slice(&value.to_be_bytes());
    };
    write_output(&request.recipient, request.amount);
    if selection.change > 0 {
        write_output(&request.change_address, selection.change);
    }

    preimage.extend_from_slice(&(input_index as u32).to_be_bytes());
    double_sha256(&preimage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(id: u8, value: u64) -> Utxo {
        Utxo {
            txid: [id; 32],
            vout: 0,
            value,
        }
    }

    fn request(utxos: Vec<Utxo>, amount: u64, fee: u64) -> UtxoRequest {
        UtxoRequest {
            utxos,
            recipient: "bc1qrecipient".into(),
            change_address: "bc1qchange".into(),
            amount,
            fee,
        }
    }

    #[test]
    fn test_largest_first_picks_biggest() {
        let utxos = vec![utxo(1, 10_000), utxo(2, 50_000), utxo(3, 30_000)];
        let selection = select_largest_first(&utxos, 40_000, 1_000).unwrap();
        assert_eq!(selection.inputs.len(), 1);
        assert_eq!(selection.inputs[0].value, 50_000);
        assert_eq!(selection.change, 9_000);
    }

    #[test]
    fn test_accumulates_until_covered() {
        let utxos = vec![utxo(1, 10_000), utxo(2, 50_000), utxo(3, 30_000)];
        let selection = select_largest_first(&utxos, 70_000, 5_000).unwrap();
        assert_eq!(selection.inputs.len(), 2);
        assert_eq!(selection.inputs[0].value, 50_000);
        assert_eq!(selection.inputs[1].value, 30_000);
        assert_eq!(selection.change, 5_000);
    }

    #[test]
    fn test_insufficient_funds() {
        let utxos = vec![utxo(1, 10_000)];
        let err = select_largest_first(&utxos, 10_000, 1_000).unwrap_err();
        match err {
            SigningError::InsufficientFunds {
                available,
                required,
            } => {
                assert_eq!(available, 10_000);
                assert_eq!(required, 11_000);
            }
            other => panic!("expected InsufficientFunds, got {other}"),
        }
    }

    #[test]
    fn test_exact_cover_no_change() {
        let utxos = vec![utxo(1, 11_000)];
        let selection = select_largest_first(&utxos, 10_000, 1_000).unwrap();
        assert_eq!(selection.change, 0);
    }

    #[test]
    fn test_selection_is_deterministic() {
        // Equal values tie-break on txid, so repeated runs agree.
        let utxos = vec![utxo(9, 20_000), utxo(1, 20_000), utxo(5, 20_000)];
        let a = select_largest_first(&utxos, 30_000, 0).unwrap();
        let b = select_largest_first(&utxos, 30_000, 0).unwrap();
        assert_eq!(a.inputs, b.inputs);
        assert_eq!(a.inputs[0].txid, [1u8; 32]);
    }

    #[test]
    fn test_digest_binds_input_index() {
        let utxos = vec![utxo(1, 30_000), utxo(2, 30_000)];
        let req = request(utxos.clone(), 40_000, 1_000);
        let selection = select_largest_first(&req.utxos, req.amount, req.fee).unwrap();
        assert_ne!(
            utxo_signing_digest(&selection, &req, 0),
            utxo_signing_digest(&selection, &req, 1)
        );
    }

    #[test]
    fn test_digest_binds_outputs() {
        let utxos = vec![utxo(1, 60_000)];
        let req_a = request(utxos.clone(), 40_000, 1_000);
        let mut req_b = request(utxos, 40_000, 1_000);
        req_b.recipient = "bc1qattacker".into();

        let sel = select_largest_first(&req_a.utxos, req_a.amount, req_a.fee).unwrap();
        assert_ne!(
            utxo_signing_digest(&sel, &req_a, 0),
            utxo_signing_digest(&sel, &req_b, 0)
        );
    }
}
