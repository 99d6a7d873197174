//! Solana address and transaction helpers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_message::VersionedMessage;
use solana_pubkey::{Pubkey, pubkey};
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use std::fmt;
use std::str::FromStr;

use tollbooth::proto::Base64Bytes;

/// Associated Token Account program id.
pub const ATA_PROGRAM_ID: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// A Solana public key carried on the wire as a base58 string.
///
/// `solana_pubkey::Pubkey` serializes as a byte array in serde, which is
/// wrong for JSON; this wrapper keeps the human-readable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SvmAddress(pub Pubkey);

impl SvmAddress {
    /// Returns the wrapped public key.
    #[must_use]
    pub const fn pubkey(&self) -> &Pubkey {
        &self.0
    }
}

impl From<Pubkey> for SvmAddress {
    fn from(value: Pubkey) -> Self {
        Self(value)
    }
}

impl FromStr for SvmAddress {
    type Err = solana_pubkey::ParsePubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pubkey::from_str(s).map(Self)
    }
}

impl fmt::Display for SvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for SvmAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for SvmAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Derives the associated token account for a wallet, token program, and
/// mint.
#[must_use]
pub fn derive_ata(wallet: &Pubkey, token_program: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[wallet.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_ID,
    )
    .0
}

/// A transaction failed signing or encoding.
#[derive(Debug, thiserror::Error)]
#[error("transaction error: {0}")]
pub struct TransactionError(pub String);

/// Signs a versioned transaction with one required signer, leaving other
/// signature slots untouched.
///
/// # Errors
///
/// Returns [`TransactionError`] when the signer is not among the required
/// signers or signing fails.
pub fn sign_transaction<S: Signer>(
    mut tx: VersionedTransaction,
    signer: &S,
) -> Result<VersionedTransaction, TransactionError> {
    let msg_bytes = tx.message.serialize();
    let signature = signer
        .try_sign_message(&msg_bytes)
        .map_err(|e| TransactionError(e.to_string()))?;

    let num_required = tx.message.header().num_required_signatures as usize;
    let static_keys = tx.message.static_account_keys();

    let pos = static_keys[..num_required.min(static_keys.len())]
        .iter()
        .position(|k| *k == signer.pubkey())
        .ok_or_else(|| TransactionError("signer not among required signers".into()))?;

    if tx.signatures.len() < num_required {
        tx.signatures.resize(num_required, Signature::default());
    }
    tx.signatures[pos] = signature;
    Ok(tx)
}

/// Returns `true` when every required signature slot holds a real signature.
#[must_use]
pub fn is_fully_signed(tx: &VersionedTransaction) -> bool {
    let num_required = tx.message.header().num_required_signatures as usize;
    tx.signatures.len() >= num_required
        && tx
            .signatures
            .iter()
            .take(num_required)
            .all(|s| *s != Signature::default())
}

/// Verifies every non-default signature against the message bytes.
///
/// Default (all-zero) signatures are skipped: a partially signed
/// transaction is still awaiting its fee payer.
#[must_use]
pub fn partial_signatures_valid(tx: &VersionedTransaction) -> bool {
    let msg_bytes = tx.message.serialize();
    let keys = tx.message.static_account_keys();
    tx.signatures.iter().enumerate().all(|(i, sig)| {
        if *sig == Signature::default() {
            return true;
        }
        keys.get(i)
            .is_some_and(|key| sig.verify(key.as_ref(), &msg_bytes))
    })
}

/// Encodes a transaction as base64(bincode) for the payload wire format.
///
/// # Errors
///
/// Returns [`TransactionError`] on serialization failure.
pub fn transaction_to_base64(tx: &VersionedTransaction) -> Result<String, TransactionError> {
    let bytes = bincode::serialize(tx).map_err(|e| TransactionError(e.to_string()))?;
    Ok(Base64Bytes::encode(bytes).to_string())
}

/// Decodes a transaction from the payload wire format.
///
/// # Errors
///
/// Returns [`TransactionError`] on base64 or bincode failure.
pub fn transaction_from_base64(encoded: &str) -> Result<VersionedTransaction, TransactionError> {
    let bytes = Base64Bytes::from(encoded)
        .decode()
        .map_err(|e| TransactionError(e.to_string()))?;
    bincode::deserialize(&bytes).map_err(|e| TransactionError(e.to_string()))
}

/// Returns the fee payer (first static account) of a transaction message.
#[must_use]
pub fn fee_payer_of(message: &VersionedMessage) -> Option<Pubkey> {
    message.static_account_keys().first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_base58_wire_format() {
        let addr: SvmAddress = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
            .parse()
            .unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v\"");
        let back: SvmAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn ata_derivation_is_deterministic() {
        let wallet = Pubkey::from([1u8; 32]);
        let mint = Pubkey::from([2u8; 32]);
        let a = derive_ata(&wallet, &spl_token::id(), &mint);
        let b = derive_ata(&wallet, &spl_token::id(), &mint);
        assert_eq!(a, b);
        assert_ne!(a, derive_ata(&mint, &spl_token::id(), &wallet));
    }
}
