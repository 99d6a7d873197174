//! Hyperliquid `sendAsset` action wire types and EIP-712 hashing.
//!
//! The user-signed type name (`HyperliquidTransaction:SendAsset`) contains a
//! colon, which Solidity identifiers cannot carry, so the typed-data hash is
//! assembled by hand from the EIP-712 primitives.

use alloy_primitives::{B256, U256, keccak256};
use alloy_sol_types::Eip712Domain;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// The EIP-155 chain id Hyperliquid actions are signed under, as the wire
/// string.
pub const SIGNATURE_CHAIN_ID_HEX: &str = "0x3e7";

/// The numeric form of [`SIGNATURE_CHAIN_ID_HEX`].
pub const SIGNATURE_CHAIN_ID: u64 = 999;

/// A spot-to-spot `sendAsset` action.
///
/// Field values are normalized before signing: the destination is
/// lowercased, and the amount is a fixed 8-decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAssetAction {
    /// Action discriminator, always `"sendAsset"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// `"Mainnet"` or `"Testnet"`.
    pub hyperliquid_chain: String,

    /// Signature chain id as a hex string (`"0x3e7"`).
    pub signature_chain_id: String,

    /// Recipient address, lowercased.
    pub destination: String,

    /// Source DEX, always `"spot"` for payments.
    pub source_dex: String,

    /// Destination DEX, always `"spot"` for payments.
    pub destination_dex: String,

    /// Token identifier (e.g., `"USDH:0x54e00a5988577cb0b0c9ab0cb6ef7f4b"`).
    pub token: String,

    /// Amount as a fixed 8-decimal string (e.g., `"0.01000000"`).
    pub amount: String,

    /// Sub-account qualifier, empty for main accounts.
    pub from_sub_account: String,

    /// Millisecond timestamp, doubling as the action nonce.
    pub nonce: u64,
}

impl SendAssetAction {
    /// Builds a normalized payment action.
    #[must_use]
    pub fn payment(
        is_mainnet: bool,
        destination: &str,
        token: impl Into<String>,
        amount: impl Into<String>,
        nonce: u64,
    ) -> Self {
        Self {
            kind: "sendAsset".into(),
            hyperliquid_chain: if is_mainnet { "Mainnet" } else { "Testnet" }.into(),
            signature_chain_id: SIGNATURE_CHAIN_ID_HEX.into(),
            destination: destination.to_lowercase(),
            source_dex: "spot".into(),
            destination_dex: "spot".into(),
            token: token.into(),
            amount: amount.into(),
            from_sub_account: String::new(),
            nonce,
        }
    }

    /// Computes the EIP-712 digest the payer signs.
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        let domain = signing_domain();
        let mut buf = Vec::with_capacity(2 + 32 + 32);
        buf.extend_from_slice(&[0x19, 0x01]);
        buf.extend_from_slice(domain.separator().as_slice());
        buf.extend_from_slice(self.struct_hash().as_slice());
        keccak256(&buf)
    }

    /// `hashStruct` over the `HyperliquidTransaction:SendAsset` type.
    fn struct_hash(&self) -> B256 {
        let type_hash = keccak256(
            b"HyperliquidTransaction:SendAsset(string hyperliquidChain,string destination,\
string sourceDex,string destinationDex,string token,string amount,\
string fromSubAccount,uint64 nonce)",
        );
        let mut encoded = Vec::with_capacity(32 * 9);
        encoded.extend_from_slice(type_hash.as_slice());
        for field in [
            &self.hyperliquid_chain,
            &self.destination,
            &self.source_dex,
            &self.destination_dex,
            &self.token,
            &self.amount,
            &self.from_sub_account,
        ] {
            encoded.extend_from_slice(keccak256(field.as_bytes()).as_slice());
        }
        encoded.extend_from_slice(&U256::from(self.nonce).to_be_bytes::<32>());
        keccak256(&encoded)
    }
}

/// The fixed signing domain for Hyperliquid user-signed actions.
#[must_use]
pub fn signing_domain() -> Eip712Domain {
    alloy_sol_types::eip712_domain! {
        name: "HyperliquidSignTransaction",
        version: "1",
        chain_id: SIGNATURE_CHAIN_ID,
        verifying_contract: alloy_primitives::Address::ZERO,
    }
}

/// An r/s/v signature over a [`SendAssetAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSignature {
    /// Signature `r` component, 0x-prefixed hex.
    pub r: String,
    /// Signature `s` component, 0x-prefixed hex.
    pub s: String,
    /// Recovery id, 27 or 28.
    pub v: u64,
}

/// Current wall clock in milliseconds, used as the action nonce.
///
/// # Panics
///
/// Panics if the system clock is set before the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_action_is_normalized() {
        let action = SendAssetAction::payment(
            true,
            "0xAbCdEf0123456789AbCdEf0123456789AbCdEf01",
            "USDH:0x54e00a5988577cb0b0c9ab0cb6ef7f4b",
            "0.01000000",
            1_700_000_000_000,
        );
        assert_eq!(action.kind, "sendAsset");
        assert_eq!(action.hyperliquid_chain, "Mainnet");
        assert_eq!(action.signature_chain_id, "0x3e7");
        assert_eq!(
            action.destination,
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
        assert_eq!(action.source_dex, "spot");
        assert_eq!(action.destination_dex, "spot");
        assert_eq!(action.from_sub_account, "");
    }

    #[test]
    fn wire_names_are_camel_case() {
        let action = SendAssetAction::payment(false, "0xab", "USDH:0x1", "1.00000000", 5);
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "sendAsset");
        assert_eq!(json["hyperliquidChain"], "Testnet");
        assert_eq!(json["signatureChainId"], "0x3e7");
        assert_eq!(json["fromSubAccount"], "");
        assert_eq!(json["nonce"], 5);
    }

    #[test]
    fn signing_hash_depends_on_every_field() {
        let base = SendAssetAction::payment(true, "0xab", "USDH:0x1", "1.00000000", 5);
        let mut other = base.clone();
        other.amount = "2.00000000".into();
        assert_ne!(base.signing_hash(), other.signing_hash());

        let mut other = base.clone();
        other.nonce = 6;
        assert_ne!(base.signing_hash(), other.signing_hash());

        assert_eq!(base.signing_hash(), base.clone().signing_hash());
    }
}
