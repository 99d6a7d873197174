//! Client-side transaction building for the Solana `exact` scheme.

use serde_json::Value;
use solana_message::VersionedMessage;
use solana_message::v0::Message as MessageV0;
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use tollbooth::proto::PaymentRequirements;
use tollbooth::scheme::{BoxFuture, SchemeClient, SchemeError};

use super::types::{ExactSolanaPayload, FeePayerExtra};
use super::SCHEME_EXACT;
use crate::chain::{derive_ata, sign_transaction, transaction_to_base64};
use crate::networks::{SvmNetworkConfig, known_networks};
use crate::rpc::SvmRpc;

/// Client for the Solana `exact` scheme.
///
/// Builds an SPL `transfer_checked` moving the required amount from the
/// payer's associated token account to the payee's, signs it as the
/// authority, and leaves the fee-payer slot for the facilitator.
pub struct ExactSvmClient<S, R> {
    signer: S,
    rpc: R,
    networks: Vec<SvmNetworkConfig>,
}

impl<S, R> std::fmt::Debug for ExactSvmClient<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactSvmClient").finish_non_exhaustive()
    }
}

impl<S, R> ExactSvmClient<S, R> {
    /// Creates a client with the given payer keypair and RPC handle.
    #[must_use]
    pub fn new(signer: S, rpc: R) -> Self {
        Self {
            signer,
            rpc,
            networks: known_networks(),
        }
    }

    /// Replaces the network catalog.
    #[must_use]
    pub fn with_networks(mut self, networks: Vec<SvmNetworkConfig>) -> Self {
        self.networks = networks;
        self
    }
}

impl<S, R> ExactSvmClient<S, R>
where
    S: Signer + Send + Sync,
    R: SvmRpc,
{
    async fn build_payload(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<ExactSolanaPayload, SchemeError> {
        let mint: Pubkey = requirements
            .asset
            .parse()
            .map_err(|_| -> SchemeError { "asset is not a Solana mint address".into() })?;
        let pay_to: Pubkey = requirements
            .pay_to
            .parse()
            .map_err(|_| -> SchemeError { "payTo is not a Solana address".into() })?;
        let amount: u64 = requirements
            .amount
            .parse()
            .map_err(|_| -> SchemeError { "amount is not an integer".into() })?;

        let extra: FeePayerExtra = requirements
            .extra
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .ok_or_else(|| -> SchemeError { "missing feePayer in requirement extra".into() })?;
        let fee_payer = *extra.fee_payer.pubkey();

        let asset_info = self
            .networks
            .iter()
            .find(|n| n.network == requirements.network)
            .and_then(|n| n.find_asset(&mint))
            .ok_or_else(|| -> SchemeError {
                format!("unknown mint {mint} on {}", requirements.network).into()
            })?;

        let token_program = asset_info.token_program();
        let authority = self.signer.pubkey();
        let source_ata = derive_ata(&authority, &token_program, &mint);
        let destination_ata = derive_ata(&pay_to, &token_program, &mint);

        let transfer = if asset_info.token_2022 {
            spl_token_2022::instruction::transfer_checked(
                &token_program,
                &source_ata,
                &mint,
                &destination_ata,
                &authority,
                &[],
                amount,
                asset_info.decimals,
            )
        } else {
            spl_token::instruction::transfer_checked(
                &token_program,
                &source_ata,
                &mint,
                &destination_ata,
                &authority,
                &[],
                amount,
                asset_info.decimals,
            )
        }
        .map_err(|e| -> SchemeError { format!("instruction build failed: {e}").into() })?;

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let message = MessageV0::try_compile(&fee_payer, &[transfer], &[], blockhash)
            .map_err(|e| -> SchemeError { format!("message compile failed: {e:?}").into() })?;

        let tx = VersionedTransaction {
            signatures: vec![],
            message: VersionedMessage::V0(message),
        };
        let signed = sign_transaction(tx, &self.signer)?;
        let encoded = transaction_to_base64(&signed)?;

        Ok(ExactSolanaPayload {
            transaction: encoded,
        })
    }
}

impl<S, R> SchemeClient for ExactSvmClient<S, R>
where
    S: Signer + Send + Sync + 'static,
    R: SvmRpc + 'static,
{
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move {
            let payload = self.build_payload(requirements).await?;
            Ok(serde_json::to_value(payload)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{partial_signatures_valid, transaction_from_base64};
    use crate::exact::types::find_transfer_checked;
    use solana_keypair::Keypair;
    use solana_message::Hash;
    use solana_signature::Signature;

    struct StubRpc;

    impl SvmRpc for StubRpc {
        fn get_latest_blockhash(&self) -> BoxFuture<'_, Result<Hash, SchemeError>> {
            Box::pin(async { Ok(Hash::default()) })
        }

        fn send_and_confirm<'a>(
            &'a self,
            _transaction: &'a VersionedTransaction,
        ) -> BoxFuture<'a, Result<Signature, SchemeError>> {
            Box::pin(async { Ok(Signature::default()) })
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

    #[tokio::test]
    async fn builds_payer_signed_transfer() {
        let payer = Keypair::new();
        let fee_payer = Pubkey::from([4u8; 32]);
        let client = ExactSvmClient::new(payer.insecure_clone(), StubRpc);

        let value = client
            .create_payment_payload(&requirements(&fee_payer))
            .await
            .unwrap();
        let payload: ExactSolanaPayload = serde_json::from_value(value).unwrap();
        let tx = transaction_from_base64(&payload.transaction).unwrap();

        // Fee payer slot is first and unsigned; the payer's signature checks out.
        assert_eq!(tx.message.static_account_keys()[0], fee_payer);
        assert!(partial_signatures_valid(&tx));

        let transfer = find_transfer_checked(&tx, &spl_token::id()).unwrap();
        assert_eq!(transfer.amount, 1_000_000);
        assert_eq!(transfer.decimals, 6);
        assert_eq!(transfer.authority, payer.pubkey());
    }

    #[tokio::test]
    async fn missing_fee_payer_is_an_error() {
        let client = ExactSvmClient::new(Keypair::new(), StubRpc);
        let fee_payer = Pubkey::from([4u8; 32]);
        let mut req = requirements(&fee_payer);
        req.extra = None;
        assert!(client.create_payment_payload(&req).await.is_err());
    }
}
