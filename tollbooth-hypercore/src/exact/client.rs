//! Client-side action signing for the Hypercore `exact` scheme.

use serde_json::Value;
use tollbooth::amount::atomic_to_decimal;
use tollbooth::proto::PaymentRequirements;
use tollbooth::scheme::{BoxFuture, SchemeClient, SchemeError};

use super::{AMOUNT_PLACES, SCHEME_EXACT};
use crate::action::{SendAssetAction, now_millis};
use crate::networks::{USDH, is_mainnet};
use crate::signer::HypercoreSigner;

/// Client for the Hypercore `exact` scheme.
///
/// Builds a `sendAsset` action moving the required amount to the payee and
/// signs it with the payer's key. The destination address is lowercased
/// before signing so both sides hash identical bytes.
pub struct ExactHypercoreClient<S> {
    signer: S,
}

impl<S> std::fmt::Debug for ExactHypercoreClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactHypercoreClient").finish_non_exhaustive()
    }
}

impl<S> ExactHypercoreClient<S> {
    /// Creates a client with the given signer.
    pub const fn new(signer: S) -> Self {
        Self { signer }
    }
}

impl<S> SchemeClient for ExactHypercoreClient<S>
where
    S: HypercoreSigner + 'static,
{
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move {
            let mainnet = is_mainnet(&requirements.network)
                .ok_or_else(|| -> SchemeError {
                    format!("not a hypercore network: {}", requirements.network).into()
                })?;

            let atomic: u128 = requirements
                .amount
                .parse()
                .map_err(|_| -> SchemeError { "amount is not an integer".into() })?;
            let decimals = requirements
                .extra
                .as_ref()
                .and_then(|v| v.get("decimals"))
                .and_then(Value::as_u64)
                .and_then(|d| u8::try_from(d).ok())
                .unwrap_or(USDH.decimals);
            let amount = atomic_to_decimal(atomic, decimals, AMOUNT_PLACES);

            let nonce = now_millis();
            let action = SendAssetAction::payment(
                mainnet,
                &requirements.pay_to,
                requirements.asset.clone(),
                amount,
                nonce,
            );

            let signature = self.signer.sign_send_asset(&action).await?;

            Ok(serde_json::json!({
                "action": action,
                "signature": signature,
                "nonce": nonce,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer_local::PrivateKeySigner;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "hypercore:mainnet".into(),
            amount: "1000000".into(),
            pay_to: "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".into(),
            max_timeout_seconds: 3600,
            asset: "USDH:0x54e00a5988577cb0b0c9ab0cb6ef7f4b".into(),
            extra: None,
        }
    }

    #[tokio::test]
    async fn payload_has_action_signature_and_nonce() {
        let client = ExactHypercoreClient::new(PrivateKeySigner::random());
        let payload = client.create_payment_payload(&requirements()).await.unwrap();
        assert!(payload.get("action").is_some());
        assert!(payload.get("signature").is_some());
        assert!(payload.get("nonce").is_some());
        assert_eq!(payload["action"]["nonce"], payload["nonce"]);
    }

    #[tokio::test]
    async fn amount_formats_with_eight_decimals() {
        let client = ExactHypercoreClient::new(PrivateKeySigner::random());
        let payload = client.create_payment_payload(&requirements()).await.unwrap();
        assert_eq!(payload["action"]["amount"], "0.01000000");

        let mut bigger = requirements();
        bigger.amount = "10000000".into();
        let payload = client.create_payment_payload(&bigger).await.unwrap();
        assert_eq!(payload["action"]["amount"], "0.10000000");
    }

    #[tokio::test]
    async fn destination_is_lowercased() {
        let client = ExactHypercoreClient::new(PrivateKeySigner::random());
        let mut req = requirements();
        req.pay_to = "0xAbCdEf0123456789AbCdEf0123456789AbCdEf01".into();
        let payload = client.create_payment_payload(&req).await.unwrap();
        assert_eq!(
            payload["action"]["destination"],
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[tokio::test]
    async fn chain_follows_network() {
        let client = ExactHypercoreClient::new(PrivateKeySigner::random());
        let payload = client.create_payment_payload(&requirements()).await.unwrap();
        assert_eq!(payload["action"]["hyperliquidChain"], "Mainnet");

        let mut testnet = requirements();
        testnet.network = "hypercore:testnet".into();
        let payload = client.create_payment_payload(&testnet).await.unwrap();
        assert_eq!(payload["action"]["hyperliquidChain"], "Testnet");
    }

    #[tokio::test]
    async fn nonce_is_wall_clock_millis() {
        let client = ExactHypercoreClient::new(PrivateKeySigner::random());
        let before = now_millis();
        let payload = client.create_payment_payload(&requirements()).await.unwrap();
        let after = now_millis();
        let nonce = payload["nonce"].as_u64().unwrap();
        assert!(nonce >= before && nonce <= after);
    }
}
