//! Wire types for the EVM `exact` scheme.

use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::sol;
use serde::{Deserialize, Serialize};
use tollbooth::proto::UnixTimestamp;

use crate::chain::TokenAmount;

/// EIP-712 structured data for an ERC-3009 transfer authorization.
///
/// Defines who may move tokens, to whom, how much, and during which time
/// window. The facilitator reconstructs this struct to verify the signature,
/// so field values must match the signed typed data exactly.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// The address authorizing the transfer (token owner).
    pub from: Address,

    /// The recipient of the transfer.
    pub to: Address,

    /// The amount to transfer, in the token's atomic units.
    pub value: TokenAmount,

    /// The authorization is not valid before this timestamp (inclusive).
    pub valid_after: UnixTimestamp,

    /// The authorization expires at this timestamp (exclusive).
    pub valid_before: UnixTimestamp,

    /// Unique 32-byte nonce preventing replay.
    pub nonce: B256,
}

/// Inner payload of an EVM `exact` payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Payload {
    /// The signature over the authorization. Either an EOA signature
    /// (65 bytes, r||s||v), an ERC-1271 contract signature, or an ERC-6492
    /// wrapped signature for an undeployed smart account.
    pub signature: Bytes,

    /// The structured authorization that was signed.
    pub authorization: Eip3009Authorization,
}

/// EIP-712 domain parameters carried in requirement `extra`.
///
/// Lets clients build the token's domain separator without an RPC call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsExtra {
    /// Token name as used in the EIP-712 domain.
    pub name: String,

    /// Token version as used in the EIP-712 domain.
    pub version: String,
}

sol!(
    /// Solidity-compatible struct for ERC-3009 `TransferWithAuthorization`
    /// typed data. Reconstructed on both sides of the protocol: the client
    /// hashes and signs it, the facilitator hashes it again to recover and
    /// check the signer.
    #[derive(Serialize, Deserialize)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{U256, address};

    #[test]
    fn payload_wire_names_are_camel_case() {
        let payload = Eip3009Payload {
            signature: Bytes::from(vec![0xab; 65]),
            authorization: Eip3009Authorization {
                from: address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
                to: address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
                value: TokenAmount(U256::from(1000u64)),
                valid_after: UnixTimestamp::from_secs(0),
                valid_before: UnixTimestamp::from_secs(1_700_000_300),
                nonce: B256::repeat_byte(0x11),
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["authorization"]["validAfter"], "0");
        assert_eq!(json["authorization"]["validBefore"], "1700000300");
        assert_eq!(json["authorization"]["value"], "1000");
        // `from` keeps its wire name on EIP-3009 authorizations.
        assert!(json["authorization"].get("from").is_some());

        let back: Eip3009Payload = serde_json::from_value(json).unwrap();
        assert_eq!(back.authorization.nonce, payload.authorization.nonce);
    }
}
