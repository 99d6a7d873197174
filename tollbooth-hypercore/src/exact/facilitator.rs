//! Facilitator-side verification and submission for the Hypercore `exact`
//! scheme.

use serde::Deserialize;
use serde_json::Value;
use tollbooth::amount::atomic_to_decimal;
use tollbooth::proto::{PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};
use tollbooth::scheme::{BoxFuture, SchemeFacilitator};

use super::{AMOUNT_PLACES, SCHEME_EXACT, HYPERCORE_FAMILY};
use crate::action::{ActionSignature, SendAssetAction, now_millis};
use crate::networks::{USDH, api_endpoint, is_mainnet};
use crate::signer::recover_action_signer;

/// Reasons a Hypercore `exact` payment fails.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HypercoreExactError {
    /// The inner payload did not parse as a signed action.
    #[error("invalid payload format: {0}")]
    InvalidFormat(String),

    /// The payload's accepted requirements do not match the server's.
    #[error("accepted does not match payment requirements")]
    RequirementsMismatch,

    /// The action targets a different chain than the requirement.
    #[error("action chain does not match requirements")]
    ChainMismatch,

    /// The action destination is not the required recipient.
    #[error("action destination does not match requirements")]
    RecipientMismatch,

    /// The action moves a different token.
    #[error("action token does not match requirements")]
    AssetMismatch,

    /// The action amount is below the required amount.
    #[error("action amount is insufficient")]
    InsufficientAmount,

    /// The action nonce is outside the allowed freshness window.
    #[error("action nonce is outside the validity window")]
    StaleNonce,

    /// The signature does not recover to a usable address.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The exchange API rejected the action.
    #[error("exchange rejected action: {0}")]
    Rejected(String),

    /// Transport to the exchange API failed.
    #[error("exchange call failed: {0}")]
    Transport(String),
}

impl HypercoreExactError {
    /// Machine-readable reason code for response objects.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => "invalid_format",
            Self::RequirementsMismatch => "accepted_requirements_mismatch",
            Self::ChainMismatch => "chain_id_mismatch",
            Self::RecipientMismatch => "recipient_mismatch",
            Self::AssetMismatch => "asset_mismatch",
            Self::InsufficientAmount => "invalid_payment_amount",
            Self::StaleNonce => "invalid_payment_expired",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::Rejected(_) | Self::Transport(_) => "settlement_failed",
        }
    }
}

/// Wire shape of the inner Hypercore payload.
#[derive(Debug, Clone, Deserialize)]
struct SignedAction {
    action: SendAssetAction,
    signature: ActionSignature,
    nonce: u64,
}

/// Facilitator for the Hypercore `exact` scheme.
///
/// Verification recovers the EIP-712 signer and checks the action against
/// the requirements; settlement posts the signed action to the Hyperliquid
/// exchange API.
#[derive(Debug, Clone)]
pub struct ExactHypercoreFacilitator {
    http: reqwest::Client,
    api_override: Option<String>,
}

impl Default for ExactHypercoreFacilitator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExactHypercoreFacilitator {
    /// Creates a facilitator targeting the public Hyperliquid endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            api_override: None,
        }
    }

    /// Overrides the exchange API endpoint. Used for tests and private
    /// deployments.
    #[must_use]
    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_override = Some(endpoint.into());
        self
    }

    fn validate(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<(SignedAction, String), HypercoreExactError> {
        let accepted = &payload.accepted;
        let matches = accepted.scheme == requirements.scheme
            && accepted.network == requirements.network
            && accepted.amount == requirements.amount
            && accepted.asset == requirements.asset
            && accepted.pay_to == requirements.pay_to;
        if !matches {
            return Err(HypercoreExactError::RequirementsMismatch);
        }

        let signed: SignedAction = serde_json::from_value(payload.payload.clone())
            .map_err(|e| HypercoreExactError::InvalidFormat(e.to_string()))?;
        let action = &signed.action;

        let mainnet = is_mainnet(&accepted.network)
            .ok_or(HypercoreExactError::ChainMismatch)?;
        let expected_chain = if mainnet { "Mainnet" } else { "Testnet" };
        if action.kind != "sendAsset" || action.hyperliquid_chain != expected_chain {
            return Err(HypercoreExactError::ChainMismatch);
        }

        if action.destination != accepted.pay_to.to_lowercase() {
            return Err(HypercoreExactError::RecipientMismatch);
        }
        if action.token != accepted.asset {
            return Err(HypercoreExactError::AssetMismatch);
        }

        let required: u128 = accepted
            .amount
            .parse()
            .map_err(|_| HypercoreExactError::InvalidFormat("amount is not an integer".into()))?;
        let required_display = atomic_to_decimal(required, USDH.decimals, AMOUNT_PLACES);
        if action.amount != required_display {
            return Err(HypercoreExactError::InsufficientAmount);
        }

        // The nonce is a millisecond timestamp; bound its age by the
        // requirement's validity window.
        let now = now_millis();
        let window_ms = accepted.max_timeout_seconds.saturating_mul(1000);
        if signed.nonce != action.nonce
            || signed.nonce.saturating_add(window_ms) < now
            || signed.nonce > now.saturating_add(window_ms)
        {
            return Err(HypercoreExactError::StaleNonce);
        }

        let payer = recover_action_signer(action, &signed.signature)
            .map_err(|e| HypercoreExactError::InvalidSignature(e.to_string()))?;

        Ok((signed, format!("{payer:?}")))
    }

    async fn submit(
        &self,
        network: &str,
        signed: &SignedAction,
    ) -> Result<(), HypercoreExactError> {
        let endpoint = self
            .api_override
            .as_deref()
            .or_else(|| api_endpoint(network))
            .ok_or(HypercoreExactError::ChainMismatch)?;

        let body = serde_json::json!({
            "action": signed.action,
            "signature": signed.signature,
            "nonce": signed.nonce,
        });

        let response = self
            .http
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| HypercoreExactError::Transport(e.to_string()))?;

        let status = response.status();
        let parsed: Value = response
            .json()
            .await
            .map_err(|e| HypercoreExactError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(HypercoreExactError::Rejected(format!("HTTP {status}")));
        }
        if parsed.get("status").and_then(Value::as_str) != Some("ok") {
            return Err(HypercoreExactError::Rejected(parsed.to_string()));
        }
        Ok(())
    }
}

impl SchemeFacilitator for ExactHypercoreFacilitator {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn caip_family(&self) -> &str {
        HYPERCORE_FAMILY
    }

    fn get_extra(&self, _network: &str) -> Option<Value> {
        None
    }

    fn get_signers(&self, _network: &str) -> Vec<String> {
        Vec::new()
    }

    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, VerifyResponse> {
        Box::pin(async move {
            match self.validate(payload, requirements) {
                Ok((_signed, payer)) => VerifyResponse::valid(payer),
                Err(err) => {
                    tracing::debug!(
                        reason = err.reason(),
                        "Hypercore payment failed verification"
                    );
                    VerifyResponse::invalid_with_message(err.reason(), err.to_string())
                }
            }
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettleResponse> {
        Box::pin(async move {
            let (signed, payer) = match self.validate(payload, requirements) {
                Ok(result) => result,
                Err(err) => {
                    return SettleResponse::error(err.reason(), payload.network())
                        .with_message(err.to_string());
                }
            };

            match self.submit(payload.network(), &signed).await {
                Ok(()) => {
                    tracing::info!(nonce = signed.nonce, "settled Hypercore payment");
                    SettleResponse::success(
                        format!("hypercore:{}", signed.nonce),
                        payload.network(),
                        payer,
                    )
                }
                Err(err) => SettleResponse::error(err.reason(), payload.network())
                    .with_message(err.to_string()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::ExactHypercoreClient;
    use crate::networks::NETWORK_MAINNET;
    use alloy_signer_local::PrivateKeySigner;
    use tollbooth::scheme::SchemeClient;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: NETWORK_MAINNET.into(),
            amount: "1000000".into(),
            pay_to: "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".into(),
            max_timeout_seconds: 3600,
            asset: USDH.token.into(),
            extra: None,
        }
    }

    async fn signed_payload(signer: &PrivateKeySigner) -> PaymentPayload {
        let client = ExactHypercoreClient::new(signer.clone());
        let inner = client.create_payment_payload(&requirements()).await.unwrap();
        PaymentPayload {
            x402_version: 2,
            accepted: requirements(),
            payload: inner,
            resource: None,
            extensions: None,
        }
    }

    #[tokio::test]
    async fn verify_recovers_the_signer() {
        let signer = PrivateKeySigner::random();
        let payload = signed_payload(&signer).await;
        let facilitator = ExactHypercoreFacilitator::new();

        let verdict = facilitator.verify(&payload, &requirements()).await;
        assert!(verdict.is_valid);
        let expected = format!("{:?}", signer.address());
        assert_eq!(verdict.payer.as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn verify_rejects_tampered_amount() {
        let signer = PrivateKeySigner::random();
        let mut payload = signed_payload(&signer).await;
        payload.payload["action"]["amount"] = serde_json::json!("9.00000000");

        let facilitator = ExactHypercoreFacilitator::new();
        let verdict = facilitator.verify(&payload, &requirements()).await;
        assert!(!verdict.is_valid);
        assert_eq!(
            verdict.invalid_reason.as_deref(),
            Some("invalid_payment_amount")
        );
    }

    #[tokio::test]
    async fn settle_posts_to_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exchange"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "response": {"type": "default"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let signer = PrivateKeySigner::random();
        let payload = signed_payload(&signer).await;
        let facilitator = ExactHypercoreFacilitator::new()
            .with_api_endpoint(format!("{}/exchange", server.uri()));

        let receipt = facilitator.settle(&payload, &requirements()).await;
        assert!(receipt.success);
        assert!(
            receipt
                .transaction
                .as_deref()
                .unwrap()
                .starts_with("hypercore:")
        );
    }

    #[tokio::test]
    async fn settle_surfaces_exchange_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exchange"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "err",
                "response": "insufficient balance",
            })))
            .mount(&server)
            .await;

        let signer = PrivateKeySigner::random();
        let payload = signed_payload(&signer).await;
        let facilitator = ExactHypercoreFacilitator::new()
            .with_api_endpoint(format!("{}/exchange", server.uri()));

        let receipt = facilitator.settle(&payload, &requirements()).await;
        assert!(!receipt.success);
        assert_eq!(receipt.error_reason.as_deref(), Some("settlement_failed"));
    }
}
