//! Signing abstraction for Hypercore payment clients.

use alloy_primitives::{Address, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use tollbooth::scheme::{BoxFuture, SchemeError};

use crate::action::{ActionSignature, SendAssetAction};

/// Signs Hyperliquid `sendAsset` actions.
pub trait HypercoreSigner: Send + Sync {
    /// The signer's EVM address.
    fn address(&self) -> Address;

    /// Signs the action's EIP-712 digest, returning r/s/v components.
    fn sign_send_asset<'a>(
        &'a self,
        action: &'a SendAssetAction,
    ) -> BoxFuture<'a, Result<ActionSignature, SchemeError>>;
}

impl HypercoreSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    fn sign_send_asset<'a>(
        &'a self,
        action: &'a SendAssetAction,
    ) -> BoxFuture<'a, Result<ActionSignature, SchemeError>> {
        Box::pin(async move {
            let hash = action.signing_hash();
            let signature = alloy_signer::Signer::sign_hash(self, &hash)
                .await
                .map_err(|e| -> SchemeError { format!("signing failed: {e}").into() })?;
            Ok(ActionSignature {
                r: format!("0x{:064x}", signature.r()),
                s: format!("0x{:064x}", signature.s()),
                v: 27 + u64::from(signature.v()),
            })
        })
    }
}

/// Recovers the signer address from an action signature.
///
/// # Errors
///
/// Returns an error when the components do not form a recoverable
/// signature.
pub fn recover_action_signer(
    action: &SendAssetAction,
    signature: &ActionSignature,
) -> Result<Address, SchemeError> {
    let r: U256 = signature
        .r
        .parse()
        .map_err(|_| -> SchemeError { "signature r is not a hex quantity".into() })?;
    let s: U256 = signature
        .s
        .parse()
        .map_err(|_| -> SchemeError { "signature s is not a hex quantity".into() })?;
    let parity = match signature.v {
        27 => false,
        28 => true,
        other => return Err(format!("unexpected recovery id {other}").into()),
    };

    let sig = alloy_primitives::Signature::new(r, s, parity);
    let hash: B256 = action.signing_hash();
    sig.recover_address_from_prehash(&hash)
        .map_err(|e| -> SchemeError { format!("recovery failed: {e}").into() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_and_recover_roundtrip() {
        let signer = PrivateKeySigner::random();
        let expected = HypercoreSigner::address(&signer);
        let action = SendAssetAction::payment(
            true,
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "USDH:0x54e00a5988577cb0b0c9ab0cb6ef7f4b",
            "0.01000000",
            1_700_000_000_000,
        );

        let signature = signer.sign_send_asset(&action).await.unwrap();
        assert!(signature.r.starts_with("0x"));
        assert!(signature.v == 27 || signature.v == 28);

        let recovered = recover_action_signer(&action, &signature).unwrap();
        assert_eq!(recovered, expected);
    }

    #[tokio::test]
    async fn tampered_action_recovers_differently() {
        let signer = PrivateKeySigner::random();
        let action = SendAssetAction::payment(true, "0xab", "USDH:0x1", "0.01000000", 7);
        let signature = signer.sign_send_asset(&action).await.unwrap();

        let mut tampered = action.clone();
        tampered.amount = "9.00000000".into();
        let recovered = recover_action_signer(&tampered, &signature).unwrap();
        assert_ne!(recovered, HypercoreSigner::address(&signer));
    }
}
