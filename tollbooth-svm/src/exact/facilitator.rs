//! Facilitator-side validation and submission for the Solana `exact`
//! scheme.

use serde_json::Value;
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use tollbooth::proto::{PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};
use tollbooth::scheme::{BoxFuture, SchemeFacilitator};

use super::types::{ExactSolanaPayload, TransferDetails, find_transfer_checked};
use super::{SCHEME_EXACT, SOLANA_FAMILY};
use crate::chain::{
    derive_ata, fee_payer_of, partial_signatures_valid, sign_transaction, transaction_from_base64,
};
use crate::networks::{SvmNetworkConfig, known_networks};
use crate::rpc::SvmRpc;

/// Reasons a Solana `exact` payment fails.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SvmExactError {
    /// The inner payload or transaction did not decode.
    #[error("invalid payload format: {0}")]
    InvalidFormat(String),

    /// The payload's accepted requirements do not match the server's.
    #[error("accepted does not match payment requirements")]
    RequirementsMismatch,

    /// No `transfer_checked` instruction found for the expected program.
    #[error("transaction carries no token transfer")]
    MissingTransfer,

    /// The transfer targets the wrong token account.
    #[error("transfer destination does not match requirements")]
    RecipientMismatch,

    /// The transfer moves the wrong mint.
    #[error("transfer asset does not match requirements")]
    AssetMismatch,

    /// The transfer amount is below the required amount.
    #[error("transfer amount is insufficient")]
    InsufficientAmount,

    /// The transaction nominates a different fee payer.
    #[error("fee payer does not match facilitator")]
    FeePayerMismatch,

    /// A present signature does not verify against the message.
    #[error("invalid signature on transaction")]
    InvalidSignature,

    /// RPC submission failed.
    #[error("submission failed: {0}")]
    Submission(String),
}

impl SvmExactError {
    /// Machine-readable reason code for response objects.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => "invalid_format",
            Self::RequirementsMismatch => "accepted_requirements_mismatch",
            Self::MissingTransfer => "invalid_format",
            Self::RecipientMismatch => "recipient_mismatch",
            Self::AssetMismatch => "asset_mismatch",
            Self::InsufficientAmount => "invalid_payment_amount",
            Self::FeePayerMismatch => "invalid_format",
            Self::InvalidSignature => "invalid_signature",
            Self::Submission(_) => "settlement_failed",
        }
    }
}

/// Facilitator for the Solana `exact` scheme.
///
/// Holds the fee-payer keypair: verified transactions are co-signed and
/// submitted through the configured RPC.
pub struct ExactSvmFacilitator<R> {
    rpc: R,
    fee_payer: Keypair,
    networks: Vec<SvmNetworkConfig>,
}

impl<R> std::fmt::Debug for ExactSvmFacilitator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactSvmFacilitator")
            .field("fee_payer", &self.fee_payer.pubkey())
            .finish_non_exhaustive()
    }
}

impl<R> ExactSvmFacilitator<R> {
    /// Creates a facilitator with the given RPC handle and fee-payer
    /// keypair.
    #[must_use]
    pub fn new(rpc: R, fee_payer: Keypair) -> Self {
        Self {
            rpc,
            fee_payer,
            networks: known_networks(),
        }
    }

    /// Replaces the network catalog.
    #[must_use]
    pub fn with_networks(mut self, networks: Vec<SvmNetworkConfig>) -> Self {
        self.networks = networks;
        self
    }

    fn validate(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<ValidatedPayment, SvmExactError> {
        let accepted = &payload.accepted;
        let matches = accepted.scheme == requirements.scheme
            && accepted.network == requirements.network
            && accepted.amount == requirements.amount
            && accepted.asset == requirements.asset
            && accepted.pay_to == requirements.pay_to;
        if !matches {
            return Err(SvmExactError::RequirementsMismatch);
        }

        let inner: ExactSolanaPayload = serde_json::from_value(payload.payload.clone())
            .map_err(|e| SvmExactError::InvalidFormat(e.to_string()))?;
        let tx = transaction_from_base64(&inner.transaction)
            .map_err(|e| SvmExactError::InvalidFormat(e.to_string()))?;

        let mint: Pubkey = accepted
            .asset
            .parse()
            .map_err(|_| SvmExactError::InvalidFormat("asset is not a mint address".into()))?;
        let pay_to: Pubkey = accepted
            .pay_to
            .parse()
            .map_err(|_| SvmExactError::InvalidFormat("payTo is not an address".into()))?;
        let required: u64 = accepted
            .amount
            .parse()
            .map_err(|_| SvmExactError::InvalidFormat("amount is not an integer".into()))?;

        let token_program = self
            .networks
            .iter()
            .find(|n| n.network == accepted.network)
            .and_then(|n| n.find_asset(&mint))
            .map_or_else(spl_token::id, |asset| asset.token_program());

        let transfer = find_transfer_checked(&tx, &token_program)
            .ok_or(SvmExactError::MissingTransfer)?;

        if transfer.mint != mint {
            return Err(SvmExactError::AssetMismatch);
        }
        let expected_destination = derive_ata(&pay_to, &token_program, &mint);
        if transfer.destination != expected_destination {
            return Err(SvmExactError::RecipientMismatch);
        }
        if transfer.amount < required {
            return Err(SvmExactError::InsufficientAmount);
        }

        if fee_payer_of(&tx.message) != Some(self.fee_payer.pubkey()) {
            return Err(SvmExactError::FeePayerMismatch);
        }
        if !partial_signatures_valid(&tx) {
            return Err(SvmExactError::InvalidSignature);
        }

        Ok(ValidatedPayment { tx, transfer })
    }
}

struct ValidatedPayment {
    tx: solana_transaction::versioned::VersionedTransaction,
    transfer: TransferDetails,
}

impl<R> SchemeFacilitator for ExactSvmFacilitator<R>
where
    R: SvmRpc + 'static,
{
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn caip_family(&self) -> &str {
        SOLANA_FAMILY
    }

    fn get_extra(&self, _network: &str) -> Option<Value> {
        Some(serde_json::json!({
            "feePayer": self.fee_payer.pubkey().to_string(),
        }))
    }

    fn get_signers(&self, _network: &str) -> Vec<String> {
        vec![self.fee_payer.pubkey().to_string()]
    }

    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, VerifyResponse> {
        Box::pin(async move {
            match self.validate(payload, requirements) {
                Ok(validated) => {
                    VerifyResponse::valid(validated.transfer.authority.to_string())
                }
                Err(err) => {
                    tracing::debug!(reason = err.reason(), "Solana payment failed verification");
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
            let validated = match self.validate(payload, requirements) {
                Ok(v) => v,
                Err(err) => {
                    return SettleResponse::error(err.reason(), payload.network())
                        .with_message(err.to_string());
                }
            };

            let signed = match sign_transaction(validated.tx, &self.fee_payer) {
                Ok(tx) => tx,
                Err(err) => {
                    return SettleResponse::error("settlement_failed", payload.network())
                        .with_message(err.to_string());
                }
            };

            match self.rpc.send_and_confirm(&signed).await {
                Ok(signature) => {
                    tracing::info!(signature = %signature, "settled Solana payment");
                    SettleResponse::success(
                        signature.to_string(),
                        payload.network(),
                        validated.transfer.authority.to_string(),
                    )
                }
                Err(err) => SettleResponse::error("settlement_failed", payload.network())
                    .with_message(err.to_string()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::client::ExactSvmClient;
    use crate::rpc::SvmRpc;
    use solana_message::Hash;
    use solana_signature::Signature;
    use solana_transaction::versioned::VersionedTransaction;
    use tollbooth::scheme::{SchemeClient, SchemeError};

    struct StubRpc;

    impl SvmRpc for StubRpc {
        fn get_latest_blockhash(&self) -> BoxFuture<'_, Result<Hash, SchemeError>> {
            Box::pin(async { Ok(Hash::default()) })
        }

        fn send_and_confirm<'a>(
            &'a self,
            _transaction: &'a VersionedTransaction,
        ) -> BoxFuture<'a, Result<Signature, SchemeError>> {
            Box::pin(async { Ok(Signature::from([7u8; 64])) })
        }
    }

    fn requirements(fee_payer: &Pubkey) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp".into(),
            amount: "1000000".into(),
            pay_to: Pubkey::from([3u8; 32]).to_string(),
            max_timeout_seconds: 60,
            asset: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into(),
            extra: Some(serde_json::json!({"feePayer": fee_payer.to_string()})),
        }
    }

    async fn signed_payload(
        requirements: &PaymentRequirements,
        payer: &Keypair,
    ) -> PaymentPayload {
        let client = ExactSvmClient::new(payer.insecure_clone(), StubRpc);
        let inner = client.create_payment_payload(requirements).await.unwrap();
        PaymentPayload {
            x402_version: 2,
            accepted: requirements.clone(),
            payload: inner,
            resource: None,
            extensions: None,
        }
    }

    #[tokio::test]
    async fn verify_accepts_well_formed_transfer() {
        let fee_payer = Keypair::new();
        let payer = Keypair::new();
        let requirements = requirements(&fee_payer.pubkey());
        let payload = signed_payload(&requirements, &payer).await;

        let facilitator = ExactSvmFacilitator::new(StubRpc, fee_payer);
        let verdict = facilitator.verify(&payload, &requirements).await;
        assert!(verdict.is_valid);
        assert_eq!(verdict.payer.as_deref(), Some(payer.pubkey().to_string().as_str()));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_fee_payer() {
        let fee_payer = Keypair::new();
        let payer = Keypair::new();
        let requirements = requirements(&Pubkey::from([9u8; 32]));
        let payload = signed_payload(&requirements, &payer).await;

        let facilitator = ExactSvmFacilitator::new(StubRpc, fee_payer);
        let verdict = facilitator.verify(&payload, &requirements).await;
        assert!(!verdict.is_valid);
        assert_eq!(verdict.invalid_reason.as_deref(), Some("invalid_format"));
    }

    #[tokio::test]
    async fn settle_reports_signature_as_transaction() {
        let fee_payer = Keypair::new();
        let payer = Keypair::new();
        let requirements = requirements(&fee_payer.pubkey());
        let payload = signed_payload(&requirements, &payer).await;

        let facilitator = ExactSvmFacilitator::new(StubRpc, fee_payer);
        let receipt = facilitator.settle(&payload, &requirements).await;
        assert!(receipt.success);
        assert!(receipt.transaction.is_some());
        assert_eq!(
            receipt.network.as_deref(),
            Some("solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp")
        );
    }

    #[tokio::test]
    async fn verify_rejects_underpaying_transfer() {
        let fee_payer = Keypair::new();
        let payer = Keypair::new();
        let mut low = requirements(&fee_payer.pubkey());
        low.amount = "1".into();
        let payload = signed_payload(&low, &payer).await;

        // Server-side requirements demand more than the signed transfer moves.
        let mut advertised = low.clone();
        advertised.amount = "1".into();
        let mut tampered = payload;
        tampered.accepted.amount = "1".into();

        let facilitator = ExactSvmFacilitator::new(StubRpc, fee_payer);
        let mut demanding = advertised;
        demanding.amount = "999999999".into();
        let verdict = facilitator.verify(&tampered, &demanding).await;
        assert!(!verdict.is_valid);
    }
}
